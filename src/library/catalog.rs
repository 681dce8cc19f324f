//! Reference catalog abstraction.
//!
//! The resolver talks to catalogs only through [`Catalog`], so tests can
//! substitute [`mocks::MockCatalog`] for the real MusicBrainz client.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Album, Artist, Song};

/// A searchable source of canonical music metadata.
///
/// Every lookup returns `Ok(None)` when the catalog has no match and
/// `Err(ProviderUnavailable)` when the catalog could not be asked. The two
/// are never conflated.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Short provider name, also used as the id key on enriched entities.
    fn name(&self) -> &str;

    async fn get_artist(&self, artist: &Artist) -> Result<Option<Artist>>;

    async fn get_album(&self, album: &Album) -> Result<Option<Album>>;

    async fn get_song(&self, song: &Song) -> Result<Option<Song>>;

    /// Albums credited to `artist`, most relevant first.
    async fn get_artist_albums(&self, artist: &Artist) -> Result<Vec<Album>>;
}
