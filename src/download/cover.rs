//! Cover art disk cache.
//!
//! Covers are referenced by URI (remote URL or local path). Remote images are
//! fetched once and kept under a digest of their URI.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Cover image bytes.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl CoverImage {
    /// File extension for the image type.
    pub fn extension(&self) -> &'static str {
        if self.mime_type.contains("png") { "png" } else { "jpg" }
    }

    fn from_bytes(data: Vec<u8>) -> Self {
        let mime_type = if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else {
            "image/jpeg"
        };
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }
}

/// Cover art disk cache.
pub struct CoverCache {
    cache_dir: PathBuf,
    http_client: reqwest::Client,
}

impl CoverCache {
    /// Create a new cache in the specified directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::provider("covers", format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            cache_dir,
            http_client,
        })
    }

    fn key(uri: &str) -> String {
        let digest = Sha256::digest(uri.as_bytes());
        digest.iter().take(16).map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the cache path for a URI, if cached.
    fn cache_path(&self, uri: &str) -> Option<PathBuf> {
        let key = Self::key(uri);
        ["jpg", "png"]
            .iter()
            .map(|ext| self.cache_dir.join(format!("{}.{}", key, ext)))
            .find(|p| p.exists())
    }

    /// Get a cached cover.
    pub fn get(&self, uri: &str) -> Option<CoverImage> {
        let path = self.cache_path(uri)?;
        let data = fs::read(&path).ok()?;
        let mime_type = match path.extension().and_then(|s| s.to_str()) {
            Some("png") => "image/png",
            _ => "image/jpeg",
        };
        Some(CoverImage {
            data,
            mime_type: mime_type.to_string(),
        })
    }

    /// Store a cover in the cache.
    pub fn put(&self, uri: &str, cover: &CoverImage) -> Result<PathBuf> {
        let path = self
            .cache_dir
            .join(format!("{}.{}", Self::key(uri), cover.extension()));
        fs::write(&path, &cover.data)?;
        Ok(path)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.cache_path(uri).is_some()
    }

    /// Resolve a cover URI to image bytes.
    ///
    /// Local paths are read directly and never cached.
    pub async fn fetch(&self, uri: &str) -> Result<CoverImage> {
        if !(uri.starts_with("http://") || uri.starts_with("https://")) {
            let data = tokio::fs::read(Path::new(uri)).await?;
            return Ok(CoverImage::from_bytes(data));
        }
        if let Some(cover) = self.get(uri) {
            return Ok(cover);
        }

        let response = self
            .http_client
            .get(uri)
            .send()
            .await
            .map_err(|e| Error::provider("covers", e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::provider("covers", format!("HTTP {} for {}", response.status(), uri)));
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| Error::provider("covers", e.to_string()))?
            .to_vec();

        let mut cover = CoverImage::from_bytes(data);
        if let Some(mime_type) = mime_type.filter(|m| m.starts_with("image/")) {
            cover.mime_type = mime_type;
        }
        if let Err(e) = self.put(uri, &cover) {
            tracing::warn!("Failed to cache cover {}: {}", uri, e);
        }
        Ok(cover)
    }

    /// Clear all cached covers.
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            for entry in fs::read_dir(&self.cache_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }
}
