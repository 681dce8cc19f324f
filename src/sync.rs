//! Moving library data between providers and the collection.

use crate::collection::Collection;
use crate::error::Result;
use crate::model::Song;
use crate::providers::StreamingProvider;

/// What an import changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub albums: usize,
    pub playlists: usize,
    pub liked_songs: usize,
    /// Entities skipped because they conflict with what the collection holds
    pub conflicts: Vec<String>,
}

/// Pull everything `provider` offers into `collection`.
///
/// All provider reads happen before the collection is touched, so an
/// unreachable provider leaves it unchanged. An entity that cannot be merged
/// is skipped and listed in the summary; the rest of the import proceeds.
pub async fn import_from(provider: &dyn StreamingProvider, collection: &mut Collection) -> Result<ImportSummary> {
    tracing::info!("Importing from {}", provider.name());
    let (albums, playlists, liked) = futures::try_join!(
        provider.get_albums(),
        provider.get_playlists(),
        provider.get_liked_songs()
    )?;

    let mut summary = ImportSummary::default();

    for album in albums {
        let label = album.to_string();
        match collection.add_album(album) {
            Ok(()) => summary.albums += 1,
            Err(e) => {
                tracing::warn!("Skipping album '{}' from {}: {}", label, provider.name(), e);
                summary.conflicts.push(label);
            }
        }
    }
    for playlist in playlists {
        let label = playlist.to_string();
        match collection.add_playlist(playlist) {
            Ok(()) => summary.playlists += 1,
            Err(e) => {
                tracing::warn!("Skipping playlist '{}' from {}: {}", label, provider.name(), e);
                summary.conflicts.push(label);
            }
        }
    }
    for song in liked.songs {
        let label = song.to_string();
        match collection.add_liked_song(song) {
            Ok(()) => summary.liked_songs += 1,
            Err(e) => {
                tracing::warn!("Skipping liked song '{}' from {}: {}", label, provider.name(), e);
                summary.conflicts.push(label);
            }
        }
    }

    tracing::info!(
        "Imported {} albums, {} playlists, {} liked songs from {} ({} conflicts)",
        summary.albums,
        summary.playlists,
        summary.liked_songs,
        provider.name(),
        summary.conflicts.len()
    );
    Ok(summary)
}

/// Push the collection to `provider`.
///
/// Fails with `ProviderUnavailable` for providers without upload support.
pub async fn upload_to(provider: &dyn StreamingProvider, collection: &Collection) -> Result<()> {
    tracing::info!("Uploading collection to {}", provider.name());
    provider.upload_albums(collection.albums()).await?;
    provider.upload_playlists(collection.playlists()).await?;
    provider.upload_liked_songs(collection.liked_songs()).await?;
    Ok(())
}

/// Songs of `collection` the provider does not know yet, judged by the
/// collection's matcher against the provider's liked songs.
pub async fn missing_liked_songs(
    provider: &dyn StreamingProvider,
    collection: &Collection,
) -> Result<Vec<Song>> {
    let remote = provider.get_liked_songs().await?;
    Ok(collection
        .liked_songs()
        .songs
        .iter()
        .filter(|s| !remote.contains(s, collection.matcher()))
        .cloned()
        .collect())
}
