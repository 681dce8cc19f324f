//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\crate-digger\config.toml
//! - macOS: ~/Library/Application Support/crate-digger/config.toml
//! - Linux: ~/.config/crate-digger/config.toml
//!
//! The file is human-readable and editable. Settings are loaded once at
//! startup and handed to [`crate::context::AppContext`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collection and cache locations, matching threshold
    pub library: LibraryConfig,

    /// Reference catalog lookups
    pub resolver: ResolverConfig,

    /// Download pipeline settings
    pub download: DownloadConfig,
}

/// Library storage and matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory holding the collection documents and archives
    pub data_dir: PathBuf,

    /// Directory holding the resolver cache documents
    pub cache_dir: PathBuf,

    /// Name similarity (percent) above which two entities are the same
    pub similarity_threshold: f64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crate-digger");
        let cache = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("crate-digger");
        Self {
            data_dir: base,
            cache_dir: cache,
            similarity_threshold: 90.0,
        }
    }
}

/// Reference catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Whether to enrich entities from the reference catalog at all
    pub enabled: bool,

    /// Minimum delay between two catalog requests (milliseconds)
    pub min_query_interval_ms: u64,

    /// Attempts per lookup, including the first one
    pub max_attempts: u32,

    /// Backoff before the first retry (milliseconds), doubled per attempt
    pub retry_base_delay_ms: u64,
}

impl ResolverConfig {
    pub fn min_query_interval(&self) -> Duration {
        Duration::from_millis(self.min_query_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // MusicBrainz allows one request per second
            min_query_interval_ms: 1100,
            max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

/// Download pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root folder for downloaded music
    pub folder: Option<PathBuf>,

    /// Worker pool size
    pub threads: usize,

    /// Audio format handed to the downloader (mp3, flac, opus, ...)
    pub format: String,

    /// Downloader quality setting (0 = best, 10 = worst)
    pub quality: u8,

    /// Nest songs under their playlist/liked folders instead of a flat root
    pub hierarchy: bool,

    /// Remove local songs that are no longer part of the container
    pub delete_stale: bool,

    /// Attempts per song, including the first one
    pub retries: u32,

    /// Folder name used for liked songs in hierarchy mode
    pub liked_songs_name: String,

    /// yt-dlp executable
    pub youtube_dl_path: String,

    /// ffmpeg executable (empty = let yt-dlp find it)
    pub ffmpeg_path: String,

    /// Netscape cookies file passed to yt-dlp
    pub cookies_file: Option<PathBuf>,

    /// Browser to read cookies from when no cookies file is set
    pub cookies_browser: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            folder: None,
            threads: 4,
            format: "mp3".to_string(),
            quality: 5,
            hierarchy: true,
            delete_stale: false,
            retries: 3,
            liked_songs_name: "Liked Songs".to_string(),
            youtube_dl_path: "yt-dlp".to_string(),
            ffmpeg_path: String::new(),
            cookies_file: None,
            cookies_browser: None,
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crate-digger"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path, falling back to defaults.
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to an explicit path.
pub fn save_to(config: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        crate::error::Error::config(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_serializes() {
        let mut config = Config::default();
        config.download.folder = Some(PathBuf::from("/music"));
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[resolver]"));
        assert!(toml.contains("[download]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.library.similarity_threshold = 85.0;
        config.download.threads = 8;
        config.download.folder = Some(PathBuf::from("/music"));

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.library.similarity_threshold, 85.0);
        assert_eq!(parsed.download.threads, 8);
        assert_eq!(parsed.download.folder, Some(PathBuf::from("/music")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[download]
threads = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.download.threads, 2);
        assert_eq!(config.download.format, "mp3");
        assert_eq!(config.library.similarity_threshold, 90.0);
        assert_eq!(config.resolver.max_attempts, 3);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.download.hierarchy = false;
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path);
        assert!(!loaded.download.hierarchy);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_unparseable_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.download.threads, 4);
    }
}
