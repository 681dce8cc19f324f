//! Application context.
//!
//! Everything a command needs, built once at startup: the matcher, the
//! storage layout, the metadata cache (loaded before any concurrent use),
//! the collection read from disk and, when enabled, a catalog resolver.

use std::path::PathBuf;
use std::sync::Arc;

use crate::collection::Collection;
use crate::config::Config;
use crate::download::{AudioSource, CancelFlag, CoverCache, Downloader, YtDlpSource};
use crate::error::{Result, ResultExt};
use crate::library::{Catalog, MetadataCache, MusicBrainzCatalog, Resolver, RetryPolicy};
use crate::matcher::Matcher;
use crate::storage::Storage;

pub struct AppContext {
    pub config: Config,
    pub matcher: Matcher,
    pub storage: Storage,
    pub cache: Arc<MetadataCache>,
    pub collection: Collection,
    resolver: Option<Resolver>,
}

impl AppContext {
    /// Build the context with the MusicBrainz catalog.
    pub fn init(config: Config) -> Result<Self> {
        let catalog: Option<Arc<dyn Catalog>> = if config.resolver.enabled {
            Some(Arc::new(MusicBrainzCatalog::new()?))
        } else {
            None
        };
        Self::init_with_catalog(config, catalog)
    }

    /// Build the context around an explicit catalog (or none).
    pub fn init_with_catalog(config: Config, catalog: Option<Arc<dyn Catalog>>) -> Result<Self> {
        let matcher = Matcher::new(config.library.similarity_threshold);
        let storage = Storage::new(&config.library.data_dir, &config.library.cache_dir);

        let cache = Arc::new(storage.load_cache().with_context("loading metadata cache")?);
        let mut collection = Collection::new(matcher);
        storage
            .import_collection(&mut collection)
            .with_context("loading collection")?;

        let resolver = catalog.map(|catalog| {
            Resolver::new(
                catalog,
                Arc::clone(&cache),
                matcher,
                RetryPolicy::from(&config.resolver),
            )
        });

        tracing::info!(
            "Context ready: {} albums, {} playlists, {} liked songs, {} cache entries",
            collection.album_count(),
            collection.playlist_count(),
            collection.liked_song_count(),
            cache.len()
        );

        Ok(Self {
            config,
            matcher,
            storage,
            cache,
            collection,
            resolver,
        })
    }

    pub fn resolver(&self) -> Option<&Resolver> {
        self.resolver.as_ref()
    }

    /// Enrich the collection from the catalog and persist the cache.
    ///
    /// The cache is saved even when resolving stops halfway, so finished
    /// lookups are not repeated.
    pub async fn resolve(&mut self) -> Result<()> {
        let Some(resolver) = self.resolver.as_ref() else {
            tracing::warn!("Resolver disabled, nothing to do");
            return Ok(());
        };
        let result = resolver.resolve_collection(&mut self.collection).await;
        self.storage
            .save_cache(&self.cache)
            .with_context("saving metadata cache")?;
        result
    }

    /// Write the collection documents and the cache.
    pub fn save(&self) -> Result<()> {
        self.storage
            .save_state(&self.collection, &self.cache)
            .with_context("saving collection and metadata cache")
    }

    /// Root folder for downloads: the configured one, else the user's music
    /// folder.
    pub fn download_root(&self) -> PathBuf {
        self.config.download.folder.clone().unwrap_or_else(|| {
            dirs::audio_dir()
                .unwrap_or_else(|| self.config.library.data_dir.join("music"))
                .join("crate-digger")
        })
    }

    /// Downloader backed by yt-dlp.
    pub fn downloader(&self, cancel: CancelFlag) -> Result<Downloader> {
        let source: Arc<dyn AudioSource> = Arc::new(YtDlpSource::new(&self.config.download));
        self.downloader_with_source(source, cancel)
    }

    pub fn downloader_with_source(&self, source: Arc<dyn AudioSource>, cancel: CancelFlag) -> Result<Downloader> {
        let covers = Arc::new(CoverCache::new(self.config.library.cache_dir.join("covers"))?);
        Ok(
            Downloader::new(self.config.download.clone(), self.download_root(), source, covers)
                .with_cancel_flag(cancel),
        )
    }
}
