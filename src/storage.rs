//! On-disk persistence for the collection and the metadata cache.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/albums.json
//! <data_dir>/playlists.json
//! <data_dir>/likedsongs.json
//! <data_dir>/archives/archive-YYYYmmdd-HHMMSS.tar.gz
//! <cache_dir>/cache-{artists,albums,songs,ids}.json
//! ```
//!
//! Every document is `{"version": 1, "items": ...}`. Unknown fields are
//! ignored and missing optional fields take their defaults, but a document
//! written by a newer major version is refused. Writes go to a temp file
//! that is renamed into place.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::library::MetadataCache;
use crate::library::cache::CACHE_FILES;
use crate::model::{Album, LikedSongs, Playlist, SongList};

/// Schema version written by this build.
pub const DOCUMENT_VERSION: u32 = 1;

pub const ALBUMS_FILE: &str = "albums.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
pub const LIKED_SONGS_FILE: &str = "likedsongs.json";

/// Collection documents inside the data directory.
pub const INVENTORY_FILES: [&str; 3] = [ALBUMS_FILE, PLAYLISTS_FILE, LIKED_SONGS_FILE];

const ARCHIVE_DIR: &str = "archives";
const ARCHIVE_DATA_PREFIX: &str = "data";
const ARCHIVE_CACHE_PREFIX: &str = "cache";

// ============================================================================
// Versioned documents
// ============================================================================

#[derive(Serialize)]
struct DocumentRef<'a, T: ?Sized> {
    version: u32,
    items: &'a T,
}

fn legacy_version() -> u32 {
    DOCUMENT_VERSION
}

#[derive(Deserialize)]
struct Document<T> {
    #[serde(default = "legacy_version")]
    version: u32,
    items: T,
}

/// Read a versioned document. A missing file is `Ok(None)`.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        std::fs::read_to_string(path).map_err(|e| Error::persistence(path, e.to_string()))?;
    let document: Document<T> = serde_json::from_str(&contents)
        .map_err(|e| Error::persistence(path, format!("malformed document: {}", e)))?;
    if document.version > DOCUMENT_VERSION {
        return Err(Error::persistence(
            path,
            format!(
                "document version {} is newer than supported version {}",
                document.version, DOCUMENT_VERSION
            ),
        ));
    }
    Ok(Some(document.items))
}

/// Write a versioned document atomically.
pub(crate) fn write_document<T: Serialize + ?Sized>(path: &Path, items: &T) -> Result<()> {
    let document = DocumentRef {
        version: DOCUMENT_VERSION,
        items,
    };
    let contents = serde_json::to_vec_pretty(&document)
        .map_err(|e| Error::persistence(path, format!("serialization failed: {}", e)))?;
    write_atomic(path, &contents)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e.to_string()))?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    std::fs::write(&temp, contents).map_err(|e| Error::persistence(&temp, e.to_string()))?;
    std::fs::rename(&temp, path).map_err(|e| Error::persistence(path, e.to_string()))
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::persistence(path, e.to_string())),
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Reads and writes the collection, the cache files and archives.
///
/// Exports hold a shared lock and archiving holds it exclusively, so a
/// snapshot never captures a half-written export.
#[derive(Debug)]
pub struct Storage {
    data_dir: PathBuf,
    cache_dir: PathBuf,
    lock: RwLock<()>,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join(ARCHIVE_DIR)
    }

    // ------------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------------

    fn write_albums(&self, albums: &[Album]) -> Result<()> {
        write_document(&self.data_dir.join(ALBUMS_FILE), albums)
    }

    fn write_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        write_document(&self.data_dir.join(PLAYLISTS_FILE), playlists)
    }

    fn write_liked_songs(&self, liked: &LikedSongs) -> Result<()> {
        write_document(&self.data_dir.join(LIKED_SONGS_FILE), &liked.songs)
    }

    pub fn export_albums(&self, albums: &[Album]) -> Result<()> {
        let _guard = self.lock.read();
        self.write_albums(albums)
    }

    pub fn export_playlists(&self, playlists: &[Playlist]) -> Result<()> {
        let _guard = self.lock.read();
        self.write_playlists(playlists)
    }

    pub fn export_liked_songs(&self, liked: &LikedSongs) -> Result<()> {
        let _guard = self.lock.read();
        self.write_liked_songs(liked)
    }

    /// Write all three collection documents under one guard, so an archive
    /// sees either none or all of them.
    pub fn export_collection(&self, collection: &Collection) -> Result<()> {
        let _guard = self.lock.read();
        self.write_collection(collection)
    }

    fn write_collection(&self, collection: &Collection) -> Result<()> {
        self.write_albums(collection.albums())?;
        self.write_playlists(collection.playlists())?;
        self.write_liked_songs(collection.liked_songs())?;
        tracing::info!(
            "Exported {} albums, {} playlists, {} liked songs to {:?}",
            collection.album_count(),
            collection.playlist_count(),
            collection.liked_song_count(),
            self.data_dir
        );
        Ok(())
    }

    /// Write the collection documents and every cache file as one unit
    /// with respect to archiving.
    pub fn save_state(&self, collection: &Collection, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        self.write_collection(collection)?;
        cache.save()
    }

    pub fn import_albums(&self) -> Result<Vec<Album>> {
        Ok(read_document(&self.data_dir.join(ALBUMS_FILE))?.unwrap_or_default())
    }

    pub fn import_playlists(&self) -> Result<Vec<Playlist>> {
        Ok(read_document(&self.data_dir.join(PLAYLISTS_FILE))?.unwrap_or_default())
    }

    pub fn import_liked_songs(&self) -> Result<LikedSongs> {
        let songs: SongList =
            read_document(&self.data_dir.join(LIKED_SONGS_FILE))?.unwrap_or_default();
        Ok(LikedSongs { songs })
    }

    /// Merge the stored collection into `collection`.
    ///
    /// All documents are read and merged into a copy first; on any error the
    /// live collection is unchanged.
    pub fn import_collection(&self, collection: &mut Collection) -> Result<()> {
        let albums = self.import_albums()?;
        let playlists = self.import_playlists()?;
        let liked = self.import_liked_songs()?;

        let mut merged = collection.clone();
        merged.add_albums(albums)?;
        merged.add_playlists(playlists)?;
        merged.add_liked_songs(liked.songs)?;
        *collection = merged;

        tracing::info!(
            "Imported collection: {} albums, {} playlists, {} liked songs",
            collection.album_count(),
            collection.playlist_count(),
            collection.liked_song_count()
        );
        Ok(())
    }

    /// Delete the collection documents. Cache files are kept.
    pub fn clear_inventory(&self) -> Result<()> {
        let _guard = self.lock.read();
        for file in INVENTORY_FILES {
            remove_if_exists(&self.data_dir.join(file))?;
        }
        tracing::info!("Cleared inventory in {:?}", self.data_dir);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------------

    pub fn load_cache(&self) -> Result<MetadataCache> {
        MetadataCache::load(&self.cache_dir)
    }

    pub fn save_cache(&self, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        cache.save()
    }

    pub fn cache_artists(&self, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        cache.save_artists()
    }

    pub fn cache_albums(&self, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        cache.save_albums()
    }

    pub fn cache_songs(&self, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        cache.save_songs()
    }

    pub fn cache_ids(&self, cache: &MetadataCache) -> Result<()> {
        let _guard = self.lock.read();
        cache.save_ids()
    }

    /// Delete the cache files. Collection documents are kept.
    pub fn clear_cache(&self) -> Result<()> {
        let _guard = self.lock.read();
        for file in CACHE_FILES {
            remove_if_exists(&self.cache_dir.join(file))?;
        }
        tracing::info!("Cleared cache in {:?}", self.cache_dir);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Archives
    // ------------------------------------------------------------------------

    /// Every (archive entry name, local path) pair a snapshot covers.
    fn snapshot_entries(&self) -> Vec<(String, PathBuf)> {
        let data = INVENTORY_FILES
            .iter()
            .map(|f| (format!("{}/{}", ARCHIVE_DATA_PREFIX, f), self.data_dir.join(f)));
        let cache = CACHE_FILES
            .iter()
            .map(|f| (format!("{}/{}", ARCHIVE_CACHE_PREFIX, f), self.cache_dir.join(f)));
        data.chain(cache).collect()
    }

    fn local_path_for(&self, entry: &str) -> Option<PathBuf> {
        let (prefix, file) = entry.split_once('/')?;
        match prefix {
            ARCHIVE_DATA_PREFIX if INVENTORY_FILES.contains(&file) => Some(self.data_dir.join(file)),
            ARCHIVE_CACHE_PREFIX if CACHE_FILES.contains(&file) => Some(self.cache_dir.join(file)),
            _ => None,
        }
    }

    fn next_archive_path(&self) -> PathBuf {
        let dir = self.archive_dir();
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut path = dir.join(format!("archive-{}.tar.gz", stamp));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("archive-{}-{}.tar.gz", stamp, n));
            n += 1;
        }
        path
    }

    fn write_archive(&self, path: &Path) -> Result<usize> {
        let dir = self.archive_dir();
        std::fs::create_dir_all(&dir).map_err(|e| Error::persistence(&dir, e.to_string()))?;

        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let result = (|| -> std::io::Result<usize> {
            let file = File::create(&temp)?;
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let mut count = 0;
            for (name, local) in self.snapshot_entries() {
                if local.is_file() {
                    builder.append_path_with_name(&local, &name)?;
                    count += 1;
                }
            }
            builder.into_inner()?.finish()?;
            Ok(count)
        })();

        match result {
            Ok(count) => {
                std::fs::rename(&temp, path).map_err(|e| Error::persistence(path, e.to_string()))?;
                Ok(count)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp);
                Err(Error::persistence(path, format!("failed to write archive: {}", e)))
            }
        }
    }

    /// Snapshot the collection and cache documents into a new archive.
    ///
    /// With `clear`, the collection documents are deleted once the archive
    /// is safely on disk.
    pub fn archive(&self, clear: bool) -> Result<PathBuf> {
        let _guard = self.lock.write();
        self.snapshot(clear)
    }

    /// Archive body; the caller holds the write lock.
    fn snapshot(&self, clear: bool) -> Result<PathBuf> {
        let path = self.next_archive_path();
        let count = self.write_archive(&path)?;
        tracing::info!("Archived {} files to {:?}", count, path);

        if clear {
            for file in INVENTORY_FILES {
                remove_if_exists(&self.data_dir.join(file))?;
            }
            tracing::info!("Cleared inventory after archiving");
        }
        Ok(path)
    }

    /// Existing archives, oldest first.
    pub fn list_archives(&self) -> Result<Vec<PathBuf>> {
        let dir = self.archive_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::persistence(&dir, e.to_string())),
        };
        let mut archives: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("archive-") && n.ends_with(".tar.gz"))
            })
            .collect();
        archives.sort();
        Ok(archives)
    }

    /// Restore an archive.
    ///
    /// The current state is archived first. Files are then restored byte for
    /// byte; documents absent from the archive are removed so the restored
    /// state matches the snapshot exactly.
    pub fn unarchive(&self, archive: &Path) -> Result<PathBuf> {
        let contents = self.read_archive(archive)?;

        let _guard = self.lock.write();
        let backup = self.snapshot(false)?;
        for (_, local) in self.snapshot_entries() {
            if !contents.iter().any(|(path, _)| path == &local) {
                remove_if_exists(&local)?;
            }
        }
        for (local, bytes) in &contents {
            write_atomic(local, bytes)?;
        }
        tracing::info!(
            "Restored {} files from {:?} (previous state saved to {:?})",
            contents.len(),
            archive,
            backup
        );
        Ok(backup)
    }

    /// Known entries of an archive, mapped to their local paths.
    fn read_archive(&self, archive: &Path) -> Result<Vec<(PathBuf, Vec<u8>)>> {
        let fail = |e: std::io::Error| Error::persistence(archive, format!("unreadable archive: {}", e));

        let file = File::open(archive).map_err(fail)?;
        let mut reader = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        let mut contents = Vec::new();
        for entry in reader.entries().map_err(fail)? {
            let mut entry = entry.map_err(fail)?;
            let name = entry.path().map_err(fail)?.to_string_lossy().into_owned();
            let Some(local) = self.local_path_for(&name) else {
                tracing::warn!("Skipping unexpected archive entry '{}'", name);
                continue;
            };
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(fail)?;
            contents.push((local, bytes));
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::model::{Artist, Identified, Song};
    use tempfile::{TempDir, tempdir};

    fn storage() -> (TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("data"), dir.path().join("cache"));
        (dir, storage)
    }

    fn sample_collection() -> Collection {
        let mut collection = Collection::new(Matcher::default());
        let mut album = Album::new("Blue")
            .with_artist(Artist::new("Joni Mitchell"))
            .with_year(1971)
            .with_id("spotify", "alb-1");
        album
            .add_song(
                Song::new("River").with_artist(Artist::new("Joni Mitchell")).with_duration(240.0),
                collection.matcher(),
            )
            .unwrap();
        collection.add_album(album).unwrap();

        let mut playlist = Playlist::new("Sad Songs").with_id("youtube", "pl-1");
        playlist.cursor.youtube_page_token = Some("TOKEN".into());
        playlist
            .add_song(Song::new("Hurt").with_artist(Artist::new("Johnny Cash")), collection.matcher())
            .unwrap();
        collection.add_playlist(playlist).unwrap();
        collection
            .add_liked_song(Song::new("Hallelujah").with_artist(Artist::new("Jeff Buckley")))
            .unwrap();
        collection
    }

    #[test]
    fn test_export_import_roundtrip() {
        let (_dir, storage) = storage();
        let original = sample_collection();
        storage.export_collection(&original).unwrap();

        let mut restored = Collection::new(Matcher::default());
        storage.import_collection(&mut restored).unwrap();

        assert_eq!(restored.album_count(), 1);
        assert_eq!(restored.playlist_count(), 1);
        assert_eq!(restored.liked_song_count(), 1);
        let album = &restored.albums()[0];
        assert_eq!(album.year, Some(1971));
        assert_eq!(album.id("spotify"), Some("alb-1"));
        assert_eq!(album.songs.iter().next().unwrap().duration, Some(240.0));
        assert_eq!(
            restored.playlists()[0].cursor.youtube_page_token.as_deref(),
            Some("TOKEN")
        );
    }

    #[test]
    fn test_import_into_existing_merges() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();

        let mut collection = sample_collection();
        storage.import_collection(&mut collection).unwrap();

        assert_eq!(collection.album_count(), 1);
        assert_eq!(collection.albums_track_count(), 1);
        assert_eq!(collection.liked_song_count(), 1);
    }

    #[test]
    fn test_missing_documents_import_empty() {
        let (_dir, storage) = storage();
        let mut collection = Collection::new(Matcher::default());
        storage.import_collection(&mut collection).unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_document_shape() {
        let (_dir, storage) = storage();
        storage.export_albums(&[Album::new("Blue")]).unwrap();

        let raw = std::fs::read_to_string(storage.data_dir().join(ALBUMS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["items"][0]["name"], "Blue");
    }

    #[test]
    fn test_unknown_fields_and_missing_version() {
        let (_dir, storage) = storage();
        std::fs::create_dir_all(storage.data_dir()).unwrap();
        std::fs::write(
            storage.data_dir().join(ALBUMS_FILE),
            r#"{"items": [{"name": "Blue", "label": "Reprise"}], "generator": "old"}"#,
        )
        .unwrap();

        let albums = storage.import_albums().unwrap();
        assert_eq!(albums.len(), 1);
        assert!(albums[0].songs.is_empty());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let (_dir, storage) = storage();
        std::fs::create_dir_all(storage.data_dir()).unwrap();
        std::fs::write(
            storage.data_dir().join(PLAYLISTS_FILE),
            r#"{"version": 2, "items": []}"#,
        )
        .unwrap();

        let mut collection = sample_collection();
        let err = storage.import_collection(&mut collection).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(collection.playlist_count(), 1);
    }

    #[test]
    fn test_malformed_document_leaves_collection_untouched() {
        let (_dir, storage) = storage();
        std::fs::create_dir_all(storage.data_dir()).unwrap();
        std::fs::write(storage.data_dir().join(LIKED_SONGS_FILE), "{ not json").unwrap();

        let mut collection = sample_collection();
        assert!(storage.import_collection(&mut collection).is_err());
        assert_eq!(collection.liked_song_count(), 1);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(storage.data_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_clear_cache_and_inventory_are_separate() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();
        let cache = storage.load_cache().unwrap();
        cache.put_id("k", "v");
        storage.cache_ids(&cache).unwrap();

        storage.clear_cache().unwrap();
        assert!(!storage.cache_dir().join("ids.json").exists());
        assert!(storage.data_dir().join(ALBUMS_FILE).exists());

        storage.clear_inventory().unwrap();
        for file in INVENTORY_FILES {
            assert!(!storage.data_dir().join(file).exists());
        }
    }

    #[test]
    fn test_archive_roundtrip_is_byte_identical() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();
        let cache = storage.load_cache().unwrap();
        cache.put_artist("artist:low", Artist::new("Low"));
        cache.save().unwrap();

        let originals: Vec<(PathBuf, Option<Vec<u8>>)> = storage
            .snapshot_entries()
            .into_iter()
            .map(|(_, p)| {
                let bytes = std::fs::read(&p).ok();
                (p, bytes)
            })
            .collect();

        let archive = storage.archive(true).unwrap();
        assert!(archive.exists());
        assert!(!storage.data_dir().join(ALBUMS_FILE).exists());

        // Diverge from the snapshot before restoring
        storage.export_albums(&[Album::new("Something Else")]).unwrap();
        storage.clear_cache().unwrap();

        storage.unarchive(&archive).unwrap();

        for (path, bytes) in originals {
            assert_eq!(std::fs::read(&path).ok(), bytes, "{:?} differs", path);
        }
    }

    #[test]
    fn test_unarchive_snapshots_current_state() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();
        let first = storage.archive(false).unwrap();

        storage.export_albums(&[]).unwrap();
        let backup = storage.unarchive(&first).unwrap();

        let archives = storage.list_archives().unwrap();
        assert_eq!(archives.len(), 2);
        assert!(archives.contains(&first));
        assert!(archives.contains(&backup));

        let mut collection = Collection::new(Matcher::default());
        storage.import_collection(&mut collection).unwrap();
        assert_eq!(collection.album_count(), 1);
    }

    #[test]
    fn test_list_archives_without_directory() {
        let (_dir, storage) = storage();
        assert!(storage.list_archives().unwrap().is_empty());
    }

    #[test]
    fn test_unarchive_missing_file_fails_cleanly() {
        let (_dir, storage) = storage();
        storage.export_collection(&sample_collection()).unwrap();
        let err = storage.unarchive(Path::new("/nonexistent/archive.tar.gz")).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(storage.list_archives().unwrap().is_empty());
    }

    #[test]
    fn test_cache_files_never_collide_with_documents() {
        for file in CACHE_FILES {
            assert!(!INVENTORY_FILES.contains(&file), "{} is used twice", file);
        }
    }

    #[test]
    fn test_save_state_writes_documents_and_cache() {
        let (_dir, storage) = storage();
        let cache = MetadataCache::load(storage.cache_dir()).unwrap();
        cache.put_id("youtube:hurt", "yt-1");
        storage.save_state(&sample_collection(), &cache).unwrap();

        assert!(storage.data_dir().join(ALBUMS_FILE).exists());
        let reloaded = storage.load_cache().unwrap();
        assert_eq!(reloaded.get_id("youtube:hurt").as_deref(), Some("yt-1"));
    }

    #[test]
    fn test_archives_never_mix_exports() {
        let (_dir, storage) = storage();
        let storage = std::sync::Arc::new(storage);

        let mut with_album = Collection::new(Matcher::default());
        with_album.add_album(Album::new("Blue")).unwrap();
        let mut with_liked = Collection::new(Matcher::default());
        with_liked.add_liked_song(Song::new("Hurt")).unwrap();
        storage.export_collection(&with_album).unwrap();

        let writer = {
            let storage = std::sync::Arc::clone(&storage);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let collection = if i % 2 == 0 { &with_liked } else { &with_album };
                    storage.export_collection(collection).unwrap();
                }
            })
        };
        let archives: Vec<PathBuf> = (0..20).map(|_| storage.archive(false).unwrap()).collect();
        writer.join().unwrap();

        for archive in archives {
            let target = tempdir().unwrap();
            let restored = Storage::new(target.path().join("data"), target.path().join("cache"));
            restored.unarchive(&archive).unwrap();

            let mut collection = Collection::new(Matcher::default());
            restored.import_collection(&mut collection).unwrap();
            assert_eq!(
                collection.album_count() + collection.liked_song_count(),
                1,
                "{:?} mixes two exports",
                archive
            );
        }
    }
}
