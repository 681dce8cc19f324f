//! Sources of library data.
//!
//! A [`StreamingProvider`] hands out playlists, albums and liked songs in
//! model form. Network services implement it outside this crate; the local
//! music folder is covered by [`LocalLibrary`].

mod local;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::model::{Album, LikedSongs, Playlist};

pub use local::{AUDIO_EXTENSIONS, LocalLibrary};

/// Library data source (and optionally sink).
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn get_playlists(&self) -> Result<Vec<Playlist>>;

    async fn get_albums(&self) -> Result<Vec<Album>>;

    async fn get_liked_songs(&self) -> Result<LikedSongs>;

    /// Playlist by provider id, `None` when it does not exist.
    async fn get_playlist(&self, id: &str) -> Result<Option<Playlist>>;

    /// Album by provider id, `None` when it does not exist.
    async fn get_album(&self, id: &str) -> Result<Option<Album>>;

    async fn upload_playlists(&self, _playlists: &[Playlist]) -> Result<()> {
        Err(Error::provider(self.name(), "upload not supported"))
    }

    async fn upload_albums(&self, _albums: &[Album]) -> Result<()> {
        Err(Error::provider(self.name(), "upload not supported"))
    }

    async fn upload_liked_songs(&self, _liked: &LikedSongs) -> Result<()> {
        Err(Error::provider(self.name(), "upload not supported"))
    }
}
