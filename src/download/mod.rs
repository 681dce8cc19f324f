//! Bulk download pipeline.
//!
//! A [`Downloader`] turns collection containers into audio files on disk:
//!
//! ```text
//! <root>/
//!   <Album (Artist)>/        album songs, album.nfo, cover.jpg
//!   <Playlist>/              hierarchy mode: playlist songs + <Playlist>.m3u
//!   <Liked Songs>/           hierarchy mode: remaining liked songs
//!   *.mp3, <Playlist>.m3u    flat mode: every song outside an album
//! ```
//!
//! A song that belongs to an album always lives in the album folder; other
//! containers reference it through their M3U. Each target file is submitted
//! at most once per batch, so a liked song inside an album is fetched once.
//!
//! Units run on a bounded [`WorkerPool`]; failures are collected per song in
//! the [`DownloadReport`] and never abort the batch. Companion files (NFO,
//! M3U, covers) are written after the pool drains.

pub mod cleanup;
pub mod companion;
pub mod cover;
pub mod pool;
pub mod source;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::collection::Collection;
use crate::config::DownloadConfig;
use crate::error::{Error, Result, ResultExt};
use crate::matcher::Matcher;
use crate::metadata;
use crate::model::{Album, LikedSongs, Playlist, Song, sanitize_filename};

pub use cover::{CoverCache, CoverImage};
pub use pool::{CancelFlag, DownloadOutcome, DownloadReport, Progress, ProgressSnapshot, WorkerPool};
pub use source::{AudioSource, YtDlpSource};

/// Tag a downloaded file.
///
/// The cover is resolved through `covers`; a missing or unreachable cover
/// only drops the picture.
pub async fn write_metadata(song: &Song, path: &Path, liked: bool, covers: &CoverCache) -> Result<()> {
    let cover = match song.cover_image.as_deref() {
        Some(uri) => match covers.fetch(uri).await {
            Ok(cover) => Some(cover.data),
            Err(e) => {
                tracing::warn!("No cover for '{}': {}", song, e);
                None
            }
        },
        None => None,
    };

    let song = song.clone();
    let path_buf = path.to_path_buf();
    tokio::task::spawn_blocking(move || metadata::write(&path_buf, &song, liked, cover.as_deref()))
        .await
        .map_err(|e| Error::metadata(path, format!("tagging task failed: {}", e)))?
}

/// Everything one unit needs, owned so it can move into a task.
struct Unit {
    song: Song,
    dest: PathBuf,
    stem: String,
    liked: bool,
    format: String,
    source: Arc<dyn AudioSource>,
    covers: Arc<CoverCache>,
    cancel: CancelFlag,
    progress: Arc<Progress>,
}

impl Unit {
    async fn run(self) -> DownloadOutcome {
        let outcome = self.execute().await;
        self.progress.record(&outcome);
        outcome
    }

    async fn execute(&self) -> DownloadOutcome {
        let song = self.song.clone();
        if self.cancel.is_cancelled() {
            return DownloadOutcome::Cancelled { song };
        }

        let target = self.dest.join(format!("{}.{}", self.stem, self.format));
        if target.exists() {
            tracing::debug!("Already downloaded: {:?}", target);
            return DownloadOutcome::Skipped { song, path: target };
        }

        let path = match self.source.fetch(&self.song, &self.dest, &self.stem).await {
            Ok(path) => path,
            Err(error) => {
                tracing::warn!("Failed to download '{}': {}", self.song, error);
                if let Err(e) = cleanup::remove_partials(&self.dest, &self.stem, &self.format) {
                    tracing::warn!("Failed to remove partial files of '{}': {}", self.song, e);
                }
                return DownloadOutcome::Failed { song, error };
            }
        };

        if self.cancel.is_cancelled() {
            // Untagged files would be skipped as complete next run
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("Failed to remove {:?}: {}", path, e);
            }
            return DownloadOutcome::Cancelled { song };
        }

        if let Err(e) = write_metadata(&self.song, &path, self.liked, &self.covers).await {
            tracing::warn!("Downloaded '{}' but could not tag it: {}", self.song, e);
        }
        tracing::info!("Downloaded '{}'", self.song);
        DownloadOutcome::Downloaded { song, path }
    }
}

/// Playlist whose M3U is written once the pool drains.
struct PendingPlaylist {
    playlist: Playlist,
    m3u_dir: PathBuf,
    entries: Vec<(Song, PathBuf)>,
}

/// State between [`Downloader::thread_init`] and
/// [`Downloader::thread_shutdown`].
struct Batch {
    pool: WorkerPool,
    matcher: Matcher,
    liked: LikedSongs,
    submitted: HashSet<PathBuf>,
    /// Folder → stems of every song placed there in this batch
    placed: HashMap<PathBuf, HashSet<String>>,
    /// Folders fully described by this batch, eligible for stale deletion
    owned: Vec<PathBuf>,
    albums: Vec<(Album, PathBuf)>,
    playlists: Vec<PendingPlaylist>,
}

/// Downloads collection containers into a music folder.
pub struct Downloader {
    config: DownloadConfig,
    root: PathBuf,
    source: Arc<dyn AudioSource>,
    covers: Arc<CoverCache>,
    cancel: CancelFlag,
    progress: Arc<Progress>,
    batch: Option<Batch>,
}

impl Downloader {
    pub fn new(
        config: DownloadConfig,
        root: impl Into<PathBuf>,
        source: Arc<dyn AudioSource>,
        covers: Arc<CoverCache>,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            source,
            covers,
            cancel: CancelFlag::new(),
            progress: Arc::new(Progress::default()),
            batch: None,
        }
    }

    /// Share an externally owned cancel flag (e.g. set by Ctrl-C).
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ------------------------------------------------------------------------
    // Pool lifecycle
    // ------------------------------------------------------------------------

    /// Open a batch with a pool of `threads` workers. No-op when one is open.
    pub fn thread_init(&mut self) {
        if self.batch.is_some() {
            return;
        }
        tracing::debug!("Starting download pool with {} workers", self.config.threads);
        self.batch = Some(Batch {
            pool: WorkerPool::new(self.config.threads),
            matcher: Matcher::default(),
            liked: LikedSongs::new(),
            submitted: HashSet::new(),
            placed: HashMap::new(),
            owned: Vec::new(),
            albums: Vec::new(),
            playlists: Vec::new(),
        });
    }

    /// Submit one song to be downloaded into `dest`. Never blocks.
    ///
    /// A target file already submitted in this batch is ignored.
    pub fn thread_download(&mut self, song: Song, dest: &Path) {
        self.place(song, dest);
    }

    /// Queue a unit and return the target path.
    fn place(&mut self, song: Song, dest: &Path) -> PathBuf {
        self.thread_init();
        let stem = song.file_name();
        let target = dest.join(format!("{}.{}", stem, self.config.format));
        let Some(batch) = self.batch.as_mut() else {
            return target;
        };

        batch
            .placed
            .entry(dest.to_path_buf())
            .or_default()
            .insert(stem.clone());
        if !batch.submitted.insert(target.clone()) {
            tracing::debug!("'{}' already queued at {:?}", song, target);
            return target;
        }

        let unit = Unit {
            liked: batch.liked.contains(&song, &batch.matcher),
            song,
            dest: dest.to_path_buf(),
            stem,
            format: self.config.format.clone(),
            source: Arc::clone(&self.source),
            covers: Arc::clone(&self.covers),
            cancel: self.cancel.clone(),
            progress: Arc::clone(&self.progress),
        };
        self.progress.record_submitted();
        batch.pool.submit(unit.run());
        target
    }

    /// Wait for every unit, then write companion files and tidy the folder.
    ///
    /// Companion failures are logged; per-song failures are in the report.
    pub async fn thread_shutdown(&mut self) -> DownloadReport {
        let Some(batch) = self.batch.take() else {
            return DownloadReport::default();
        };
        let Batch {
            pool,
            placed,
            owned,
            albums,
            playlists,
            ..
        } = batch;

        let report = pool.join().await;
        tracing::info!(
            "Download batch finished: {} downloaded, {} skipped, {} failed, {} cancelled",
            report.downloaded(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );

        for (album, dir) in &albums {
            if let Err(e) = self.write_album_data(album, dir).await {
                tracing::error!("Failed to write album data for '{}': {}", album, e);
            }
        }
        for pending in &playlists {
            if let Err(e) = self
                .write_playlist_data(&pending.playlist, &pending.m3u_dir, &pending.entries)
                .await
            {
                tracing::error!("Failed to write playlist '{}': {}", pending.playlist, e);
            }
        }

        if self.config.delete_stale && !self.cancel.is_cancelled() {
            for dir in &owned {
                let keep = placed.get(dir).cloned().unwrap_or_default();
                if let Err(e) = cleanup::delete_stale(dir, &keep, &self.config.format) {
                    tracing::error!("Failed to delete stale songs in {:?}: {}", dir, e);
                }
            }
        }
        if let Err(e) = cleanup::clean_folder(&self.root, &self.config.format) {
            tracing::error!("Failed to clean {:?}: {}", self.root, e);
        }
        report
    }

    // ------------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------------

    pub fn album_dir(&self, album: &Album) -> PathBuf {
        self.root.join(album.folder_name())
    }

    /// Folder holding a playlist's songs and M3U.
    pub fn playlist_dir(&self, playlist: &Playlist) -> PathBuf {
        if self.config.hierarchy {
            self.root.join(playlist.folder_name())
        } else {
            self.root.clone()
        }
    }

    pub fn liked_dir(&self) -> PathBuf {
        match sanitize_filename(&self.config.liked_songs_name) {
            Some(name) if self.config.hierarchy => self.root.join(name),
            _ => self.root.clone(),
        }
    }

    /// Album folder when `song` belongs to an album, otherwise `fallback`.
    fn song_dir(&self, collection: &Collection, song: &Song, fallback: PathBuf) -> PathBuf {
        match collection.song_album(song) {
            Some(album) => self.album_dir(album),
            None => fallback,
        }
    }

    /// Song as stored in `album`, completed with album-level data for tagging.
    fn album_song(album: &Album, song: &Song) -> Song {
        let mut song = song.clone();
        if song.album.is_none() {
            song.album = Some(album.name.clone());
        }
        if song.cover_image.is_none() {
            song.cover_image = album.cover_image.clone();
        }
        if song.artist.is_none()
            && let Some(artist) = album.main_artist()
        {
            song.artist = Some(artist.clone());
        }
        song
    }

    // ------------------------------------------------------------------------
    // Enqueueing
    // ------------------------------------------------------------------------

    /// Open a batch for `collection` if none is open. Returns whether this
    /// call opened it.
    fn begin(&mut self, collection: &Collection) -> bool {
        let opened = self.batch.is_none();
        self.thread_init();
        if let Some(batch) = self.batch.as_mut() {
            batch.matcher = *collection.matcher();
            batch.liked = collection.liked_songs().clone();
        }
        opened
    }

    async fn finish(&mut self, opened: bool) -> DownloadReport {
        if opened {
            self.thread_shutdown().await
        } else {
            DownloadReport::default()
        }
    }

    fn enqueue_album(&mut self, album: &Album) {
        let dir = self.album_dir(album);
        tracing::info!("Queueing album '{}' ({} songs)", album, album.len());
        for song in &album.songs {
            self.place(Self::album_song(album, song), &dir);
        }
        if let Some(batch) = self.batch.as_mut() {
            batch.owned.push(dir.clone());
            batch.albums.push((album.clone(), dir));
        }
    }

    fn enqueue_playlist(&mut self, collection: &Collection, playlist: &Playlist) {
        let m3u_dir = self.playlist_dir(playlist);
        tracing::info!("Queueing playlist '{}' ({} songs)", playlist, playlist.len());

        let mut entries = Vec::with_capacity(playlist.len());
        for song in &playlist.songs {
            let song = match collection.song_album(song) {
                Some(album) => Self::album_song(album, song),
                None => song.clone(),
            };
            let dir = self.song_dir(collection, &song, m3u_dir.clone());
            let target = self.place(song.clone(), &dir);
            entries.push((song, target));
        }

        if let Some(batch) = self.batch.as_mut() {
            if self.config.hierarchy {
                batch.owned.push(m3u_dir.clone());
            }
            batch.playlists.push(PendingPlaylist {
                playlist: playlist.clone(),
                m3u_dir,
                entries,
            });
        }
    }

    fn enqueue_liked<'a>(&mut self, collection: &Collection, songs: impl IntoIterator<Item = &'a Song>) {
        let liked_dir = self.liked_dir();
        for song in songs {
            let fallback = match collection.song_playlist(song) {
                Some(playlist) => self.playlist_dir(playlist),
                None => liked_dir.clone(),
            };
            let song = match collection.song_album(song) {
                Some(album) => Self::album_song(album, song),
                None => song.clone(),
            };
            let dir = self.song_dir(collection, &song, fallback);
            self.place(song, &dir);
        }
        if self.config.hierarchy
            && liked_dir != self.root
            && let Some(batch) = self.batch.as_mut()
        {
            batch.owned.push(liked_dir);
        }
    }

    // ------------------------------------------------------------------------
    // Container downloads
    // ------------------------------------------------------------------------

    pub async fn download_album(&mut self, collection: &Collection, album: &Album) -> DownloadReport {
        self.download_albums(collection, std::slice::from_ref(album)).await
    }

    pub async fn download_albums(&mut self, collection: &Collection, albums: &[Album]) -> DownloadReport {
        let opened = self.begin(collection);
        for album in albums {
            self.enqueue_album(album);
        }
        self.finish(opened).await
    }

    pub async fn download_playlist(&mut self, collection: &Collection, playlist: &Playlist) -> DownloadReport {
        self.download_playlists(collection, std::slice::from_ref(playlist)).await
    }

    pub async fn download_playlists(&mut self, collection: &Collection, playlists: &[Playlist]) -> DownloadReport {
        let opened = self.begin(collection);
        for playlist in playlists {
            self.enqueue_playlist(collection, playlist);
        }
        self.finish(opened).await
    }

    pub async fn download_liked_songs(&mut self, collection: &Collection) -> DownloadReport {
        let opened = self.begin(collection);
        self.enqueue_liked(collection, collection.liked_songs().songs.iter());
        self.finish(opened).await
    }

    /// Download every album, playlist and liked song in one batch.
    pub async fn download_all(&mut self, collection: &Collection) -> DownloadReport {
        let opened = self.begin(collection);
        for album in collection.albums() {
            self.enqueue_album(album);
        }
        for playlist in collection.playlists() {
            self.enqueue_playlist(collection, playlist);
        }
        self.enqueue_liked(collection, collection.standalone_liked_songs_excluding_playlists());
        if !self.config.hierarchy
            && let Some(batch) = self.batch.as_mut()
        {
            batch.owned.push(self.root.clone());
        }
        self.finish(opened).await
    }

    // ------------------------------------------------------------------------
    // Companion files
    // ------------------------------------------------------------------------

    /// Write the cover next to a container, returning its file name.
    async fn write_cover(&self, uri: Option<&str>, dir: &Path, stem: &str) -> Option<String> {
        let uri = uri?;
        match self.covers.fetch(uri).await {
            Ok(cover) => {
                let name = format!("{}.{}", stem, cover.extension());
                match tokio::fs::write(dir.join(&name), &cover.data).await {
                    Ok(()) => Some(name),
                    Err(e) => {
                        tracing::warn!("Failed to write cover {:?}: {}", dir.join(&name), e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch cover {}: {}", uri, e);
                None
            }
        }
    }

    /// Write `album.nfo` and the cover into the album folder.
    pub async fn write_album_data(&self, album: &Album, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(format!("creating {:?}", dir))?;
        let cover = self
            .write_cover(album.cover_image.as_deref(), dir, companion::COVER_STEM)
            .await;
        let nfo = companion::album_nfo(album, cover.as_deref());
        tokio::fs::write(dir.join(companion::ALBUM_NFO), nfo)
            .await
            .with_context(format!("writing NFO for '{}'", album))?;
        Ok(())
    }

    /// Write `<playlist>.m3u` and the cover into `m3u_dir`.
    ///
    /// Only songs present on disk are listed.
    pub async fn write_playlist_data(
        &self,
        playlist: &Playlist,
        m3u_dir: &Path,
        entries: &[(Song, PathBuf)],
    ) -> Result<()> {
        tokio::fs::create_dir_all(m3u_dir)
            .await
            .with_context(format!("creating {:?}", m3u_dir))?;
        let stem = playlist.folder_name();
        let cover = self
            .write_cover(playlist.cover_image.as_deref(), m3u_dir, &stem)
            .await;

        let lines: Vec<(&Song, String)> = entries
            .iter()
            .filter(|(_, path)| path.exists())
            .map(|(song, path)| (song, companion::relative_path(m3u_dir, path)))
            .collect();
        let m3u = companion::playlist_m3u(playlist, &lines, cover.as_deref());
        tokio::fs::write(m3u_dir.join(format!("{}.m3u", stem)), m3u)
            .await
            .with_context(format!("writing M3U for '{}'", playlist))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::source::mocks::MockSource;
    use super::*;
    use crate::model::Artist;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        covers: Arc<CoverCache>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("music");
        let covers = Arc::new(CoverCache::new(temp.path().join("covers")).unwrap());
        Fixture {
            _temp: temp,
            root,
            covers,
        }
    }

    fn config(threads: usize, hierarchy: bool) -> DownloadConfig {
        DownloadConfig {
            threads,
            hierarchy,
            ..Default::default()
        }
    }

    fn downloader(fx: &Fixture, config: DownloadConfig, source: Arc<MockSource>) -> Downloader {
        Downloader::new(config, &fx.root, source, Arc::clone(&fx.covers))
    }

    fn album(name: &str, songs: &[&str]) -> Album {
        let matcher = Matcher::default();
        let mut album = Album::new(name).with_artist(Artist::new("Band"));
        for song in songs {
            album
                .add_song(Song::new(*song).with_artist(Artist::new("Band")), &matcher)
                .unwrap();
        }
        album
    }

    #[tokio::test]
    async fn test_album_on_bounded_pool() {
        let fx = fixture();
        let album = album(
            "Ten",
            &[
                "Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot", "Golf", "Hotel", "India", "Juliet",
            ],
        );
        let mut collection = Collection::default();
        collection.add_album(album.clone()).unwrap();

        let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(20)));
        let mut dl = downloader(&fx, config(3, false), Arc::clone(&source));
        let report = dl.download_album(&collection, &album).await;

        assert_eq!(report.downloaded(), 10);
        assert!(source.peak_concurrency() <= 3);
        let dir = dl.album_dir(&album);
        let files = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "mp3"))
            .count();
        assert_eq!(files, 10);
        assert!(dir.join(companion::ALBUM_NFO).exists());
        assert_eq!(dl.progress().snapshot().downloaded, 10);
    }

    #[tokio::test]
    async fn test_liked_song_in_album_downloaded_once() {
        let fx = fixture();
        let album = album("Debut", &["Hurt", "Intro"]);
        let mut collection = Collection::default();
        collection.add_album(album).unwrap();
        collection
            .add_liked_song(Song::new("Hurt").with_artist(Artist::new("Band")))
            .unwrap();

        let source = Arc::new(MockSource::new());
        let mut dl = downloader(&fx, config(4, false), Arc::clone(&source));
        let report = dl.download_all(&collection).await;

        assert_eq!(report.len(), 2);
        let hurts = source.fetched().iter().filter(|n| n.as_str() == "Hurt").count();
        assert_eq!(hurts, 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_cleaned() {
        let fx = fixture();
        let album = album("Mixed", &["Good One", "Bad One", "Good Two"]);
        let mut collection = Collection::default();
        collection.add_album(album.clone()).unwrap();

        let source = Arc::new(MockSource::new().failing_on("Bad One"));
        let mut dl = downloader(&fx, config(2, false), source);
        let report = dl.download_album(&collection, &album).await;

        assert_eq!(report.downloaded(), 2);
        assert_eq!(report.failed(), 1);
        let (song, error) = report.failures().next().unwrap();
        assert_eq!(song.name, "Bad One");
        assert!(matches!(error, Error::Download { .. }));
        assert!(!dl.album_dir(&album).join("Bad One - Band.mp3.part").exists());
    }

    #[tokio::test]
    async fn test_cancelled_batch_fetches_nothing() {
        let fx = fixture();
        let album = album("Stopped", &["One", "Two"]);
        let collection = Collection::default();

        let source = Arc::new(MockSource::new());
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut dl = downloader(&fx, config(2, false), Arc::clone(&source)).with_cancel_flag(cancel);
        let report = dl.download_album(&collection, &album).await;

        assert_eq!(report.cancelled(), 2);
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped() {
        let fx = fixture();
        let album = album("Again", &["Hurt"]);
        let collection = Collection::default();

        let source = Arc::new(MockSource::new());
        let mut dl = downloader(&fx, config(1, false), Arc::clone(&source));
        let dir = dl.album_dir(&album);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Hurt - Band.mp3"), b"audio").unwrap();

        let report = dl.download_album(&collection, &album).await;

        assert_eq!(report.skipped(), 1);
        assert!(source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_hierarchy_playlist_references_album_folder() {
        let fx = fixture();
        let album = album("Debut", &["Hurt"]);
        let mut playlist = Playlist::new("Road Trip");
        let matcher = Matcher::default();
        playlist
            .add_song(Song::new("Hurt").with_artist(Artist::new("Band")), &matcher)
            .unwrap();
        playlist.add_song(Song::new("Loose"), &matcher).unwrap();

        let mut collection = Collection::default();
        collection.add_album(album.clone()).unwrap();
        collection.add_playlist(playlist.clone()).unwrap();

        let source = Arc::new(MockSource::new());
        let mut dl = downloader(&fx, config(2, true), source);
        let report = dl.download_playlist(&collection, &playlist).await;
        assert_eq!(report.downloaded(), 2);

        let playlist_dir = dl.playlist_dir(&playlist);
        assert!(playlist_dir.join("Loose.mp3").exists());
        assert!(dl.album_dir(&album).join("Hurt - Band.mp3").exists());

        let m3u = std::fs::read_to_string(playlist_dir.join("Road Trip.m3u")).unwrap();
        assert!(m3u.starts_with("#EXTM3U\n#PLAYLIST:Road Trip\n"));
        assert!(m3u.contains("../Debut (Band)/Hurt - Band.mp3"));
        assert!(m3u.contains("\nLoose.mp3\n"));
    }

    #[tokio::test]
    async fn test_flat_layout_puts_liked_songs_in_root() {
        let fx = fixture();
        let mut collection = Collection::default();
        collection.add_liked_song(Song::new("Loose")).unwrap();

        let mut dl = downloader(&fx, config(1, false), Arc::new(MockSource::new()));
        dl.download_liked_songs(&collection).await;

        assert!(fx.root.join("Loose.mp3").exists());
    }

    #[tokio::test]
    async fn test_delete_stale_in_album_folder() {
        let fx = fixture();
        let album = album("Current", &["Keep"]);
        let collection = Collection::default();
        let mut cfg = config(1, false);
        cfg.delete_stale = true;

        let mut dl = downloader(&fx, cfg, Arc::new(MockSource::new()));
        let dir = dl.album_dir(&album);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("Old - Band.mp3"), b"audio").unwrap();

        dl.download_album(&collection, &album).await;

        assert!(dir.join("Keep - Band.mp3").exists());
        assert!(!dir.join("Old - Band.mp3").exists());
    }

    #[tokio::test]
    async fn test_manual_pool_lifecycle() {
        let fx = fixture();
        let source = Arc::new(MockSource::new());
        let mut dl = downloader(&fx, config(2, false), Arc::clone(&source));

        dl.thread_init();
        dl.thread_download(Song::new("One"), &fx.root);
        dl.thread_download(Song::new("One"), &fx.root);
        dl.thread_download(Song::new("Two"), &fx.root);
        let report = dl.thread_shutdown().await;

        assert_eq!(report.downloaded(), 2);
        assert_eq!(source.fetched().len(), 2);
        assert!(dl.thread_shutdown().await.is_empty());
    }
}
