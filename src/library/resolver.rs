//! Cache-first metadata resolution.
//!
//! Every lookup goes cache → catalog. Catalog calls are paced to a minimum
//! interval and retried with exponential backoff on transient failures. Keys
//! already sent to the catalog in this run (hit or miss) are remembered so
//! the same entity is never queried twice, even from concurrent tasks.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::cache::{self, MetadataCache};
use super::Catalog;
use crate::collection::Collection;
use crate::config::ResolverConfig;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::model::{Album, Artist, Song};

/// Retry and pacing knobs.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub min_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ResolverConfig::default())
    }
}

impl From<&ResolverConfig> for RetryPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.retry_base_delay(),
            min_interval: config.min_query_interval(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Exclusive right to query the catalog for one key.
///
/// Other callers for the same key wait until the claim is dropped. The key
/// only counts as checked once [`Claim::checked`] is called, so a failed
/// lookup leaves it open for the next caller.
struct Claim<'a> {
    verified: &'a Mutex<HashSet<String>>,
    key: String,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl Claim<'_> {
    fn checked(self) {
        self.verified.lock().insert(self.key);
    }
}

pub struct Resolver {
    catalog: Arc<dyn Catalog>,
    cache: Arc<MetadataCache>,
    matcher: Matcher,
    policy: RetryPolicy,
    verified: Mutex<HashSet<String>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    last_query: tokio::sync::Mutex<Option<Instant>>,
}

impl Resolver {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        cache: Arc<MetadataCache>,
        matcher: Matcher,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            catalog,
            cache,
            matcher,
            policy,
            verified: Mutex::new(HashSet::new()),
            in_flight: Mutex::new(HashMap::new()),
            last_query: tokio::sync::Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    /// Claim `key` for a catalog query, waiting out any lookup of the same
    /// key in progress. `None` when the key was already checked this run;
    /// whatever that lookup found is in the cache by then.
    async fn claim(&self, key: &str) -> Option<Claim<'_>> {
        let lock = Arc::clone(self.in_flight.lock().entry(key.to_string()).or_default());
        let guard = lock.lock_owned().await;
        if self.verified.lock().contains(key) {
            return None;
        }
        Some(Claim {
            verified: &self.verified,
            key: key.to_string(),
            _guard: guard,
        })
    }

    pub fn verified_count(&self) -> usize {
        self.verified.lock().len()
    }

    /// Wait until the minimum interval since the previous query has passed.
    async fn throttle(&self) {
        let mut last = self.last_query.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.min_interval {
                tokio::time::sleep(self.policy.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Run a catalog call with pacing and bounded retries.
    async fn query<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            self.throttle().await;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "{} lookup for {} failed (attempt {}/{}), retrying in {:?}: {}",
                        self.catalog.name(),
                        what,
                        attempt,
                        self.policy.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.context(format!("looking up {}", what))),
            }
        }
    }

    pub async fn resolve_artist(&self, artist: &mut Artist) -> Result<()> {
        if artist.is_empty() {
            return Ok(());
        }
        let key = cache::artist_key(artist);
        if let Some(hit) = self.cache.get_artist(&key) {
            artist.merge(hit);
            return Ok(());
        }
        let Some(claim) = self.claim(&key).await else {
            if let Some(hit) = self.cache.get_artist(&key) {
                artist.merge(hit);
            }
            return Ok(());
        };

        let current: &Artist = artist;
        let found = self.query(&key, || self.catalog.get_artist(current)).await?;
        match found {
            Some(found) if self.matcher.matches(&*artist, &found) => {
                tracing::debug!("Resolved artist '{}'", artist);
                artist.merge(found.clone());
                self.cache.put_artist(key, found);
            }
            Some(found) => {
                tracing::debug!("Catalog returned '{}' for artist '{}', ignoring", found, artist);
            }
            None => tracing::debug!("Artist '{}' not in catalog", artist),
        }
        claim.checked();
        Ok(())
    }

    pub async fn resolve_album(&self, album: &mut Album) -> Result<()> {
        if album.name.trim().is_empty() {
            return Ok(());
        }
        let key = cache::album_key(album);
        if let Some(hit) = self.cache.get_album(&key) {
            self.absorb_album(album, hit);
            return Ok(());
        }
        let Some(claim) = self.claim(&key).await else {
            if let Some(hit) = self.cache.get_album(&key) {
                self.absorb_album(album, hit);
            }
            return Ok(());
        };

        let current: &Album = album;
        let found = self.query(&key, || self.catalog.get_album(current)).await?;
        match found {
            Some(found) if self.matcher.albums_match(album, &found) => {
                tracing::debug!("Resolved album '{}'", album);
                if self.absorb_album(album, found.clone()) {
                    self.cache.put_album(key, found);
                }
            }
            Some(found) => {
                tracing::debug!("Catalog returned '{}' for album '{}', ignoring", found, album);
            }
            None => tracing::debug!("Album '{}' not in catalog", album),
        }
        claim.checked();
        Ok(())
    }

    /// Merge a catalog album; a conflicting record is discarded.
    fn absorb_album(&self, album: &mut Album, found: Album) -> bool {
        match album.merge(found, &self.matcher) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Discarding catalog data for '{}': {}", album, e);
                false
            }
        }
    }

    pub async fn resolve_song(&self, song: &mut Song) -> Result<()> {
        if song.is_empty() {
            return Ok(());
        }
        let key = cache::song_key(song);
        if let Some(hit) = self.cache.get_song(&key) {
            self.absorb_song(song, hit);
            return Ok(());
        }
        let Some(claim) = self.claim(&key).await else {
            if let Some(hit) = self.cache.get_song(&key) {
                self.absorb_song(song, hit);
            }
            return Ok(());
        };

        let current: &Song = song;
        let found = self.query(&key, || self.catalog.get_song(current)).await?;
        match found {
            Some(found) if self.matcher.songs_match(song, &found) => {
                tracing::debug!("Resolved song '{}'", song);
                if self.absorb_song(song, found.clone()) {
                    self.cache.put_song(key, found);
                }
            }
            Some(found) => {
                tracing::debug!("Catalog returned '{}' for song '{}', ignoring", found, song);
            }
            None => tracing::debug!("Song '{}' not in catalog", song),
        }
        claim.checked();
        Ok(())
    }

    fn absorb_song(&self, song: &mut Song, found: Song) -> bool {
        match song.merge(found, &self.matcher) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Discarding catalog data for '{}': {}", song, e);
                false
            }
        }
    }

    /// Look up a plain id through the ids cache.
    ///
    /// `lookup` runs at most once per key per run, paced and retried like
    /// catalog calls. Misses are not cached on disk.
    pub async fn resolve_id<F, Fut>(&self, provider: &str, key: &str, lookup: F) -> Result<Option<String>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let cache_key = cache::id_key(provider, key);
        if let Some(id) = self.cache.get_id(&cache_key) {
            return Ok(Some(id));
        }
        let Some(claim) = self.claim(&cache_key).await else {
            return Ok(self.cache.get_id(&cache_key));
        };
        let found = self.query(&cache_key, lookup).await?;
        if let Some(id) = &found {
            self.cache.put_id(cache_key, id.clone());
        }
        claim.checked();
        Ok(found)
    }

    /// Albums the catalog credits to `artist`. Each album is cached; a
    /// second listing of the same artist in one run returns nothing.
    pub async fn artist_albums(&self, artist: &Artist) -> Result<Vec<Album>> {
        let key = format!("albums-of:{}", cache::artist_key(artist));
        let Some(claim) = self.claim(&key).await else {
            return Ok(Vec::new());
        };
        let albums = self
            .query(&key, || self.catalog.get_artist_albums(artist))
            .await?;
        for album in &albums {
            self.cache.put_album(cache::album_key(album), album.clone());
        }
        claim.checked();
        tracing::debug!("Found {} albums for '{}'", albums.len(), artist);
        Ok(albums)
    }

    /// Enrich every album, playlist song and liked song in place.
    pub async fn resolve_collection(&self, collection: &mut Collection) -> Result<()> {
        let before = self.cache.len();

        for album in collection.albums_mut() {
            self.resolve_album(album).await?;
            for song in album.songs.iter_mut() {
                self.resolve_song(song).await?;
            }
        }
        for playlist in collection.playlists_mut() {
            for song in playlist.songs.iter_mut() {
                self.resolve_song(song).await?;
            }
        }
        for song in collection.liked_songs_mut().songs.iter_mut() {
            self.resolve_song(song).await?;
        }

        tracing::info!(
            "Resolved collection: {} new cache entries, {} catalog keys checked",
            self.cache.len().saturating_sub(before),
            self.verified_count()
        );
        Ok(())
    }
}
