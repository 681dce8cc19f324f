//! Application-wide error types.
//!
//! Library modules return [`Error`] through the [`Result`] alias, while the
//! CLI and `main` use `anyhow` for convenient error propagation.
//!
//! # Kinds
//!
//! - [`Error::NotFound`]: a lookup missed in the collection or the cache.
//!   Callers usually recover by treating the entity as new.
//! - [`Error::ProviderUnavailable`]: a catalog, streaming service or
//!   downloader could not be reached. Never treated as an empty result.
//! - [`Error::MergeConflict`]: two entities judged equal carry data that
//!   cannot be reconciled. The receiver is left untouched.
//! - [`Error::InvalidEntity`]: an entity without a name was offered to a
//!   container. Nothing is stored.
//! - [`Error::Persistence`]: reading or writing the data directory failed.
//! - [`Error::Download`]: a single song failed to download. Collected per
//!   unit by the download pipeline instead of aborting the batch.
//!
//! # Example
//!
//! ```ignore
//! use crate_digger::error::{Error, Result, ResultExt};
//!
//! fn load(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_context("reading albums")
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Entity or cache lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// External collaborator (catalog, streaming service, downloader) failed
    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Provider asked us to slow down
    #[error("Provider {0} rate limited the request")]
    RateLimited(String),

    /// Two matching entities carry irreconcilable data
    #[error("Merge conflict on '{entity}': {reason}")]
    MergeConflict { entity: String, reason: String },

    /// Entity that cannot be stored, such as one without a name
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// Disk error while exporting, caching or archiving
    #[error("Persistence error for {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// A single song failed to download
    #[error("Download of '{song}' failed: {message}")]
    Download { song: String, message: String },

    /// Work was stopped by a shutdown request
    #[error("Operation cancelled")]
    Cancelled,

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tag reading/writing error
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a provider unavailable error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a merge conflict error.
    pub fn merge_conflict(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MergeConflict {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid entity error.
    pub fn invalid_entity(what: impl Into<String>) -> Self {
        Self::InvalidEntity(what.into())
    }

    /// Create a persistence error.
    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a download error.
    pub fn download(song: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            song: song.into(),
            message: message.into(),
        }
    }

    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether a retry might succeed.
    ///
    /// Only transport-level failures qualify; misses and conflicts are final.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable { .. } | Self::RateLimited(_) => true,
            Self::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, serde_json::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Json(e).context(ctx))
    }
}
