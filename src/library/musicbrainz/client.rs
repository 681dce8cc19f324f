//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz search web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to
//! 1 req/sec. Pacing is the resolver's job; every catalog call here issues
//! exactly one request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{adapter, dto};
use crate::error::{Error, Result};
use crate::library::Catalog;
use crate::model::{Album, Artist, Identified, Song, providers};

const PROVIDER: &str = "musicbrainz";

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "CrateDigger/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/crate-digger)"
);

/// Results requested per search
const SEARCH_LIMIT: u32 = 5;

/// Upper bound for one request, connection included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// MusicBrainz catalog
pub struct MusicBrainzCatalog {
    http_client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzCatalog {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://musicbrainz.org/ws/2")
    }

    /// Create a client against a custom base URL (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    /// Like [`with_base_url`](Self::with_base_url) with an explicit request
    /// timeout. A stalled server fails the lookup instead of holding a
    /// resolver permit forever.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider(PROVIDER, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Lucene query: `field:"value" AND field:"value"`.
    fn build_query(fields: &[(&str, &str)]) -> String {
        fields
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(field, value)| format!("{}:\"{}\"", field, value.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn search_url(&self, entity: &str, query: &str) -> String {
        format!(
            "{}/{}?query={}&fmt=json&limit={}",
            self.base_url,
            entity,
            urlencoding::encode(query),
            SEARCH_LIMIT
        )
    }

    /// Artist constraint: the MusicBrainz id when known, else the name.
    fn artist_field(artist: Option<&Artist>) -> Option<(&'static str, String)> {
        let artist = artist?;
        match artist.id(providers::MUSICBRAINZ) {
            Some(id) => Some(("arid", id.to_string())),
            None => Some(("artist", artist.name.clone())),
        }
    }

    /// Send the HTTP request and parse the response
    async fn search<T: DeserializeOwned>(&self, entity: &str, query: &str) -> Result<Option<T>> {
        if query.is_empty() {
            return Ok(None);
        }
        let url = self.search_url(entity, query);
        tracing::debug!("MusicBrainz query: {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(Error::RateLimited(PROVIDER.to_string()));
        }

        if !status.is_success() {
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(Error::provider(PROVIDER, error.error));
            }
            return Err(Error::provider(
                PROVIDER,
                format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| Error::provider(PROVIDER, format!("unparseable response: {}", e)))
    }
}

#[async_trait]
impl Catalog for MusicBrainzCatalog {
    fn name(&self) -> &str {
        providers::MUSICBRAINZ
    }

    async fn get_artist(&self, artist: &Artist) -> Result<Option<Artist>> {
        let query = Self::build_query(&[("artist", artist.name.as_str())]);
        let response: Option<dto::ArtistSearch> = self.search("artist", &query).await?;
        Ok(response.and_then(adapter::first_artist))
    }

    async fn get_album(&self, album: &Album) -> Result<Option<Album>> {
        let artist = Self::artist_field(album.main_artist());
        let mut fields = vec![("release", album.name.as_str())];
        if let Some((field, value)) = &artist {
            fields.push((*field, value.as_str()));
        }
        fields.push(("primarytype", "Album"));

        let query = Self::build_query(&fields);
        let response: Option<dto::ReleaseSearch> = self.search("release", &query).await?;
        Ok(response.and_then(adapter::first_album))
    }

    async fn get_song(&self, song: &Song) -> Result<Option<Song>> {
        let artist = Self::artist_field(song.artist.as_ref());
        let mut fields = vec![("recording", song.name.as_str())];
        if let Some((field, value)) = &artist {
            fields.push((*field, value.as_str()));
        }
        fields.push(("video", "false"));

        let query = Self::build_query(&fields);
        let response: Option<dto::RecordingSearch> = self.search("recording", &query).await?;
        Ok(response.and_then(adapter::first_song))
    }

    async fn get_artist_albums(&self, artist: &Artist) -> Result<Vec<Album>> {
        let Some((field, value)) = Self::artist_field(Some(artist)) else {
            return Ok(Vec::new());
        };
        let query = Self::build_query(&[(field, value.as_str()), ("primarytype", "Album")]);
        let response: Option<dto::ReleaseGroupSearch> =
            self.search("release-group", &query).await?;
        Ok(response.map(adapter::albums).unwrap_or_default())
    }
}
