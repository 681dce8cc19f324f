//! Persistent cache of catalog lookups.
//!
//! Four maps (artists, albums, songs, plain ids) each behind a
//! `parking_lot::RwLock`, so worker tasks can read concurrently while the
//! resolver writes. The cache is loaded once at startup and written back
//! explicitly; nothing re-reads the files behind its back.

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::matcher::normalize;
use crate::model::{Album, Artist, Song};
use crate::storage;

// Prefixed so a cache sharing the data directory never clobbers the
// collection documents.
pub const ARTISTS_FILE: &str = "cache-artists.json";
pub const ALBUMS_FILE: &str = "cache-albums.json";
pub const SONGS_FILE: &str = "cache-songs.json";
pub const IDS_FILE: &str = "cache-ids.json";

/// Every file the cache owns inside its directory.
pub const CACHE_FILES: [&str; 4] = [ARTISTS_FILE, ALBUMS_FILE, SONGS_FILE, IDS_FILE];

pub fn artist_key(artist: &Artist) -> String {
    format!("artist:{}", normalize(&artist.name))
}

pub fn album_key(album: &Album) -> String {
    let artist = album.main_artist().map(|a| normalize(&a.name)).unwrap_or_default();
    format!("album:{}|{}", normalize(&album.name), artist)
}

pub fn song_key(song: &Song) -> String {
    let artist = song.artist.as_ref().map(|a| normalize(&a.name)).unwrap_or_default();
    format!("song:{}|{}", normalize(&song.name), artist)
}

pub fn id_key(provider: &str, key: &str) -> String {
    format!("{}:{}", provider, key)
}

/// Entry counts per map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub artists: usize,
    pub albums: usize,
    pub songs: usize,
    pub ids: usize,
}

impl CacheStats {
    pub fn total(&self) -> usize {
        self.artists + self.albums + self.songs + self.ids
    }
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    dir: Option<PathBuf>,
    artists: RwLock<BTreeMap<String, Artist>>,
    albums: RwLock<BTreeMap<String, Album>>,
    songs: RwLock<BTreeMap<String, Song>>,
    ids: RwLock<BTreeMap<String, String>>,
}

fn load_map<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<BTreeMap<String, T>> {
    Ok(storage::read_document(&dir.join(file))?.unwrap_or_default())
}

impl MetadataCache {
    /// In-memory cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load every cache file under `dir`; missing files start empty.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let cache = Self {
            artists: RwLock::new(load_map(&dir, ARTISTS_FILE)?),
            albums: RwLock::new(load_map(&dir, ALBUMS_FILE)?),
            songs: RwLock::new(load_map(&dir, SONGS_FILE)?),
            ids: RwLock::new(load_map(&dir, IDS_FILE)?),
            dir: Some(dir),
        };
        let stats = cache.stats();
        tracing::info!(
            "Loaded metadata cache: {} artists, {} albums, {} songs, {} ids",
            stats.artists,
            stats.albums,
            stats.songs,
            stats.ids
        );
        Ok(cache)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn save_map<T: Serialize>(&self, file: &str, map: &RwLock<BTreeMap<String, T>>) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        storage::write_document(&dir.join(file), &*map.read())
    }

    pub fn save_artists(&self) -> Result<()> {
        self.save_map(ARTISTS_FILE, &self.artists)
    }

    pub fn save_albums(&self) -> Result<()> {
        self.save_map(ALBUMS_FILE, &self.albums)
    }

    pub fn save_songs(&self) -> Result<()> {
        self.save_map(SONGS_FILE, &self.songs)
    }

    pub fn save_ids(&self) -> Result<()> {
        self.save_map(IDS_FILE, &self.ids)
    }

    /// Write all four maps.
    pub fn save(&self) -> Result<()> {
        self.save_artists()?;
        self.save_albums()?;
        self.save_songs()?;
        self.save_ids()?;
        tracing::debug!("Saved metadata cache ({} entries)", self.len());
        Ok(())
    }

    /// Drop every in-memory entry. Files are left alone.
    pub fn clear(&self) {
        self.artists.write().clear();
        self.albums.write().clear();
        self.songs.write().clear();
        self.ids.write().clear();
    }

    pub fn get_artist(&self, key: &str) -> Option<Artist> {
        self.artists.read().get(key).cloned()
    }

    pub fn put_artist(&self, key: impl Into<String>, artist: Artist) {
        self.artists.write().insert(key.into(), artist);
    }

    pub fn get_album(&self, key: &str) -> Option<Album> {
        self.albums.read().get(key).cloned()
    }

    pub fn put_album(&self, key: impl Into<String>, album: Album) {
        self.albums.write().insert(key.into(), album);
    }

    pub fn get_song(&self, key: &str) -> Option<Song> {
        self.songs.read().get(key).cloned()
    }

    pub fn put_song(&self, key: impl Into<String>, song: Song) {
        self.songs.write().insert(key.into(), song);
    }

    pub fn get_id(&self, key: &str) -> Option<String> {
        self.ids.read().get(key).cloned()
    }

    pub fn put_id(&self, key: impl Into<String>, id: impl Into<String>) {
        self.ids.write().insert(key.into(), id.into());
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            artists: self.artists.read().len(),
            albums: self.albums.read().len(),
            songs: self.songs.read().len(),
            ids: self.ids.read().len(),
        }
    }

    pub fn len(&self) -> usize {
        self.stats().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
