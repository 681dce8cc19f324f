//! Local music folder as a library source.
//!
//! Layout conventions, matching what the downloader produces:
//! - a folder with an `album.nfo`, or whose audio files all carry the same
//!   album tag, is an album
//! - any other folder is a playlist, described by an `.m3u` inside it when
//!   there is one
//! - `.m3u` files in the root are playlists
//! - loose audio files in the root and the liked songs folder are liked
//!   songs, as is any file rated as liked

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::StreamingProvider;
use crate::download::companion::{self, ALBUM_NFO};
use crate::error::{Error, Result, ResultExt};
use crate::matcher::Matcher;
use crate::metadata;
use crate::model::{Album, Artist, Identified, LikedSongs, Playlist, Song, providers};

/// Extensions treated as audio files (lowercase).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a"];

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| wanted.contains(&e.to_ascii_lowercase().as_str()))
}

fn is_audio(path: &Path) -> bool {
    path.is_file() && has_extension(path, AUDIO_EXTENSIONS)
}

fn is_m3u(path: &Path) -> bool {
    path.is_file() && has_extension(path, &["m3u", "m3u8"])
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Direct children of `dir`, sorted by file name.
fn children(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect()
}

/// Song from a `"Title - Artist"` label.
fn song_from_label(label: &str) -> Song {
    match label.rsplit_once(" - ") {
        Some((title, artist)) if !title.trim().is_empty() => {
            Song::new(title.trim()).with_artist(Artist::new(artist.trim()))
        }
        _ => Song::new(label.trim()),
    }
}

/// First `<tag>` value in an XML document, unescaped.
fn xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    let value = xml[start..end]
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    Some(value).filter(|v| !v.trim().is_empty())
}

/// Music folder reader.
#[derive(Debug, Clone)]
pub struct LocalLibrary {
    root: PathBuf,
    liked_songs_name: String,
    matcher: Matcher,
}

impl LocalLibrary {
    pub fn new(root: impl Into<PathBuf>, liked_songs_name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            root: root.into(),
            liked_songs_name: liked_songs_name.into(),
            matcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_liked_folder(&self, path: &Path) -> bool {
        path.file_name()
            .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(&self.liked_songs_name))
    }

    fn local_id(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Song described by a file's tags, falling back to its file name.
    ///
    /// Unreadable tags are not an error: the file still names a song.
    pub fn get_song(&self, file: &Path) -> Song {
        let mut song = match metadata::read(file) {
            Ok(tags) => {
                let label = file_stem(file);
                if tags.title.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                    tags.into_song(&label)
                } else {
                    let mut song = song_from_label(&label);
                    song.duration = tags.duration.filter(|d| *d > 0.0);
                    song
                }
            }
            Err(e) => {
                tracing::debug!("Using file name for {:?}: {}", file, e);
                song_from_label(&file_stem(file))
            }
        };
        song.add_id(providers::LOCAL, &self.local_id(file));
        song
    }

    /// Audio files directly inside `folder`, in file name order.
    pub fn get_songs(&self, folder: &Path) -> Vec<Song> {
        children(folder)
            .iter()
            .filter(|p| is_audio(p))
            .map(|p| self.get_song(p))
            .collect()
    }

    /// Whether a file carries the liked marker.
    pub fn is_liked(&self, file: &Path) -> bool {
        metadata::read(file).map(|t| t.liked).unwrap_or(false)
    }

    /// Whether `folder` holds an album.
    ///
    /// True with an `album.nfo`, otherwise when at least two audio files
    /// exist and all of them share one non-empty album tag.
    pub fn is_album(&self, folder: &Path) -> bool {
        if !folder.is_dir() {
            return false;
        }
        if folder.join(ALBUM_NFO).is_file() {
            return true;
        }
        let files: Vec<PathBuf> = children(folder).into_iter().filter(|p| is_audio(p)).collect();
        if files.len() < 2 {
            return false;
        }

        let mut album: Option<String> = None;
        for file in &files {
            let Ok(tags) = metadata::read(file) else {
                return false;
            };
            match (tags.album.filter(|a| !a.trim().is_empty()), &album) {
                (None, _) => return false,
                (Some(found), None) => album = Some(found),
                (Some(found), Some(expected)) if &found != expected => return false,
                _ => {}
            }
        }
        album.is_some()
    }

    /// Album stored in `folder`, with its songs.
    pub fn get_album(&self, folder: &Path) -> Result<Album> {
        let songs = self.get_songs(folder);
        let nfo = std::fs::read_to_string(folder.join(ALBUM_NFO)).ok();

        let name = nfo
            .as_deref()
            .and_then(|x| xml_value(x, "title"))
            .or_else(|| songs.iter().find_map(|s| s.album.clone()))
            .unwrap_or_else(|| file_stem(folder));
        let mut album = Album::new(name);
        album.add_id(providers::LOCAL, &self.local_id(folder));

        if let Some(xml) = nfo.as_deref() {
            if let Some(artist) = xml_value(xml, "artist") {
                album.add_artist(Artist::new(artist), &self.matcher);
            }
            album.year = xml_value(xml, "year").and_then(|y| y.trim().parse().ok());
            if let Some(thumb) = xml_value(xml, "thumb")
                && folder.join(&thumb).is_file()
            {
                album.cover_image = Some(folder.join(thumb).to_string_lossy().into_owned());
            }
        }

        for mut song in songs {
            song.album = Some(album.name.clone());
            album
                .add_song(song, &self.matcher)
                .with_context(format!("reading album {:?}", folder))?;
        }
        Ok(album)
    }

    /// Playlist described by an M3U file.
    ///
    /// Entries pointing at missing files are kept, built from their
    /// `#EXTINF` title.
    pub fn get_playlist(&self, m3u: &Path) -> Result<Playlist> {
        let text = std::fs::read_to_string(m3u)
            .map_err(|e| Error::persistence(m3u, format!("failed to read playlist: {}", e)))?;
        let base = m3u.parent().unwrap_or(&self.root);
        let parsed = companion::parse_m3u(&text, base);

        let mut playlist = Playlist::new(parsed.name.unwrap_or_else(|| file_stem(m3u)));
        playlist.add_id(providers::LOCAL, &self.local_id(m3u));
        if let Some(cover) = parsed.cover.filter(|c| c.is_file()) {
            playlist.cover_image = Some(cover.to_string_lossy().into_owned());
        }

        for entry in parsed.entries {
            let song = if entry.path.is_file() {
                self.get_song(&entry.path)
            } else {
                tracing::debug!("Song referenced in {:?} not found: {:?}", m3u, entry.path);
                let label = entry.title.unwrap_or_else(|| file_stem(&entry.path));
                let mut song = song_from_label(&label);
                song.duration = entry.duration;
                song
            };
            if song.is_empty() {
                continue;
            }
            playlist
                .add_song(song, &self.matcher)
                .with_context(format!("reading playlist {:?}", m3u))?;
        }
        Ok(playlist)
    }

    /// Playlist for a non-album folder: its M3U when present, otherwise the
    /// folder's audio files.
    pub fn get_playlist_folder(&self, folder: &Path) -> Result<Playlist> {
        if let Some(m3u) = children(folder).into_iter().find(|p| is_m3u(p)) {
            return self.get_playlist(&m3u);
        }
        let mut playlist = Playlist::new(file_stem(folder));
        playlist.add_id(providers::LOCAL, &self.local_id(folder));
        playlist.add_songs(self.get_songs(folder), &self.matcher)?;
        Ok(playlist)
    }

    /// Loose root files, the liked songs folder, and rated files elsewhere.
    pub fn get_liked_songs(&self) -> Result<LikedSongs> {
        let mut liked = LikedSongs::new();
        for path in children(&self.root) {
            if is_audio(&path) {
                liked.add_song(self.get_song(&path), &self.matcher)?;
            } else if path.is_dir() && self.is_liked_folder(&path) {
                liked.add_songs(self.get_songs(&path), &self.matcher)?;
            } else if path.is_dir() {
                for file in children(&path).iter().filter(|p| is_audio(p)) {
                    if self.is_liked(file) {
                        liked.add_song(self.get_song(file), &self.matcher)?;
                    }
                }
            }
        }
        Ok(liked)
    }

    /// Subfolders that are not the liked songs folder.
    fn container_folders(&self) -> Vec<PathBuf> {
        children(&self.root)
            .into_iter()
            .filter(|p| p.is_dir() && !self.is_liked_folder(p))
            .collect()
    }

    pub fn get_albums(&self) -> Result<Vec<Album>> {
        let mut albums = Vec::new();
        for folder in self.container_folders() {
            if self.is_album(&folder) {
                let album = self.get_album(&folder)?;
                if !album.is_empty() {
                    albums.push(album);
                }
            }
        }
        Ok(albums)
    }

    pub fn get_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        for path in children(&self.root) {
            if is_m3u(&path) && !file_stem(&path).eq_ignore_ascii_case(&self.liked_songs_name) {
                playlists.push(self.get_playlist(&path)?);
            }
        }
        for folder in self.container_folders() {
            if !self.is_album(&folder) {
                let playlist = self.get_playlist_folder(&folder)?;
                if !playlist.is_empty() {
                    playlists.push(playlist);
                }
            }
        }
        Ok(playlists)
    }

    /// Resolve a provider id (path relative to the root).
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let path = self.root.join(id);
        path.exists().then_some(path)
    }

    /// Run blocking folder work off the async runtime.
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(LocalLibrary) -> Result<T> + Send + 'static,
    {
        let library = self.clone();
        tokio::task::spawn_blocking(move || work(library))
            .await
            .map_err(|e| Error::provider("local", format!("folder scan failed: {}", e)))?
    }
}

#[async_trait]
impl StreamingProvider for LocalLibrary {
    fn name(&self) -> &str {
        providers::LOCAL
    }

    async fn get_playlists(&self) -> Result<Vec<Playlist>> {
        self.blocking(|lib| lib.get_playlists()).await
    }

    async fn get_albums(&self) -> Result<Vec<Album>> {
        self.blocking(|lib| lib.get_albums()).await
    }

    async fn get_liked_songs(&self) -> Result<LikedSongs> {
        self.blocking(|lib| lib.get_liked_songs()).await
    }

    async fn get_playlist(&self, id: &str) -> Result<Option<Playlist>> {
        let id = id.to_string();
        self.blocking(move |lib| match lib.resolve(&id) {
            Some(path) if is_m3u(&path) => lib.get_playlist(&path).map(Some),
            Some(path) if path.is_dir() => lib.get_playlist_folder(&path).map(Some),
            _ => Ok(None),
        })
        .await
    }

    async fn get_album(&self, id: &str) -> Result<Option<Album>> {
        let id = id.to_string();
        self.blocking(move |lib| match lib.resolve(&id) {
            Some(path) if path.is_dir() => lib.get_album(&path).map(Some),
            _ => Ok(None),
        })
        .await
    }
}
