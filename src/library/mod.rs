//! Metadata enrichment against reference catalogs.
//!
//! - [`Catalog`]: async lookup trait, implemented by [`MusicBrainzCatalog`]
//! - [`MetadataCache`]: persistent cache of previous lookups
//! - [`Resolver`]: cache-first lookups with pacing and bounded retries

pub mod cache;
pub mod catalog;
pub mod musicbrainz;
mod resolver;

pub use cache::{CacheStats, MetadataCache};
pub use catalog::Catalog;
pub use musicbrainz::MusicBrainzCatalog;
pub use resolver::{Resolver, RetryPolicy};
