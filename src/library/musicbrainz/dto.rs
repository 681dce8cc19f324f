//! MusicBrainz API Data Transfer Objects
//!
//! These types match what the MusicBrainz search endpoints return.
//! DO NOT use these types outside the musicbrainz module - convert to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search

use serde::Deserialize;

/// `/artist?query=` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistSearch {
    #[serde(default)]
    pub artists: Vec<Artist>,
}

/// `/release?query=` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseSearch {
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// `/recording?query=` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingSearch {
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

/// `/release-group?query=` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroupSearch {
    #[serde(default)]
    pub release_groups: Vec<ReleaseGroup>,
}

/// Artist info
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artist {
    /// MusicBrainz artist ID
    pub id: String,
    /// Official artist name
    pub name: String,
    /// Search relevance, 0-100
    pub score: Option<u32>,
    /// Sort name (e.g., "Beatles, The")
    pub sort_name: Option<String>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistCredit {
    /// How this artist is credited (may differ from official name)
    pub name: Option<String>,
    pub artist: Artist,
}

/// Release (one edition of an album)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Release {
    pub id: String,
    pub title: String,
    pub score: Option<u32>,
    /// Release date (YYYY, YYYY-MM, or YYYY-MM-DD)
    pub date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    pub release_group: Option<ReleaseGroupRef>,
    pub track_count: Option<u32>,
}

/// Release group reference embedded in a release
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroupRef {
    pub id: String,
    pub primary_type: Option<String>,
}

/// Release group (an album across all of its editions)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    pub score: Option<u32>,
    pub primary_type: Option<String>,
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
}

/// Recording (a song)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recording {
    pub id: String,
    pub title: String,
    pub score: Option<u32>,
    /// Duration in milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
}

/// Release reference embedded in a recording
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRef {
    pub id: String,
    pub title: String,
}

/// Error body returned on failures
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: String,
}
