use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Artist, ExternalIds, Identified, Matchable};
use crate::error::{Error, Result};
use crate::matcher::Matcher;

/// Two known durations further apart than this cannot be the same recording.
pub const DURATION_TOLERANCE_SECS: f64 = 30.0;

/// A single song.
///
/// The song carries a copy of its artist; albums and playlists own their
/// songs, a song owns nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<Artist>,
    /// Album title used for tagging; membership lives in [`super::Album`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Length in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub ids: ExternalIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: Artist) -> Self {
        self.set_artist(artist);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover_image = Some(cover.into());
        self
    }

    pub fn with_id(mut self, provider: &str, id: &str) -> Self {
        self.add_id(provider, id);
        self
    }

    /// Set the artist; empty artists are ignored.
    pub fn set_artist(&mut self, artist: Artist) {
        if !artist.is_empty() {
            self.artist = Some(artist);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Duration in seconds, zero when unknown.
    pub fn duration_secs(&self) -> f64 {
        self.duration.unwrap_or(0.0)
    }

    /// File name without extension: `"Title - Artist"`.
    pub fn file_name(&self) -> String {
        super::file_stem(self, &self.to_string())
    }

    /// Reason why `other` cannot be merged into `self`, if any.
    pub fn conflict_with(&self, other: &Song) -> Option<String> {
        match (self.duration, other.duration) {
            (Some(a), Some(b)) if a > 0.0 && b > 0.0 && (a - b).abs() > DURATION_TOLERANCE_SECS => {
                Some(format!("durations differ: {:.0}s vs {:.0}s", a, b))
            }
            _ => None,
        }
    }

    /// Absorb `other` into this song without losing information.
    ///
    /// A song without an artist adopts both name and artist from `other`,
    /// since the other side is the more complete record.
    pub fn merge(&mut self, other: Song, matcher: &Matcher) -> Result<()> {
        if let Some(reason) = self.conflict_with(&other) {
            return Err(Error::merge_conflict(self.to_string(), reason));
        }

        if let Some(theirs) = other.artist {
            if self.artist.is_none() {
                if !other.name.trim().is_empty() {
                    self.name = other.name;
                }
                self.artist = Some(theirs);
            } else if let Some(mine) = self.artist.as_mut()
                && matcher.matches(&*mine, &theirs)
            {
                mine.merge(theirs);
            }
        }
        if self.album.is_none() {
            self.album = other.album;
        }
        if self.duration.is_none() {
            self.duration = other.duration;
        }
        if self.cover_image.is_none() {
            self.cover_image = other.cover_image;
        }
        self.add_ids(&other.ids);
        Ok(())
    }
}

impl Identified for Song {
    fn name(&self) -> &str {
        &self.name
    }

    fn ids(&self) -> &ExternalIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut ExternalIds {
        &mut self.ids
    }

    fn cover_image(&self) -> Option<&str> {
        self.cover_image.as_deref()
    }
}

impl Matchable for Song {
    fn matches(&self, other: &Self, matcher: &Matcher) -> bool {
        matcher.songs_match(self, other)
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artist {
            Some(artist) => write!(f, "{} - {}", self.name, artist.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> Matcher {
        Matcher::new(90.0)
    }

    #[test]
    fn test_display_includes_artist() {
        let song = Song::new("Hurt").with_artist(Artist::new("Johnny Cash"));
        assert_eq!(song.to_string(), "Hurt - Johnny Cash");
        assert_eq!(Song::new("Hurt").to_string(), "Hurt");
    }

    #[test]
    fn test_empty_artist_is_ignored() {
        let song = Song::new("Hurt").with_artist(Artist::new("  "));
        assert!(song.artist.is_none());
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let mut song = Song::new("hurt").with_id("youtube", "yt-1");
        let other = Song::new("Hurt")
            .with_artist(Artist::new("Johnny Cash"))
            .with_duration(218.0)
            .with_cover("https://img/hurt.jpg")
            .with_id("spotify", "sp-1");

        song.merge(other, &matcher()).unwrap();

        assert_eq!(song.name, "Hurt");
        assert_eq!(song.artist.as_ref().map(|a| a.name.as_str()), Some("Johnny Cash"));
        assert_eq!(song.duration, Some(218.0));
        assert_eq!(song.cover_image.as_deref(), Some("https://img/hurt.jpg"));
        assert_eq!(song.id("youtube"), Some("yt-1"));
        assert_eq!(song.id("spotify"), Some("sp-1"));
    }

    #[test]
    fn test_merge_never_overwrites_with_empty() {
        let mut song = Song::new("Hurt")
            .with_artist(Artist::new("Johnny Cash"))
            .with_duration(218.0);
        song.merge(Song::new("Hurt"), &matcher()).unwrap();

        assert!(song.artist.is_some());
        assert_eq!(song.duration, Some(218.0));
    }

    #[test]
    fn test_merge_conflicting_durations_is_rejected() {
        let mut song = Song::new("Hurt").with_duration(218.0);
        let other = Song::new("Hurt").with_duration(400.0).with_id("spotify", "x");

        let err = song.merge(other, &matcher()).unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
        assert!(song.ids.is_empty());
    }

    #[test]
    fn test_duration_secs_defaults_to_zero() {
        assert_eq!(Song::new("x").duration_secs(), 0.0);
    }

    #[test]
    fn test_file_name_is_sanitized() {
        let song = Song::new("What?").with_artist(Artist::new("AC/DC"));
        assert_eq!(song.file_name(), "What_ - AC_DC");
    }
}
