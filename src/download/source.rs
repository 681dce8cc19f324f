//! Audio sources: where the bytes of a song come from.
//!
//! The pipeline only knows [`AudioSource`]. [`YtDlpSource`] shells out to
//! yt-dlp, which searches, downloads and transcodes in one go.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::model::{Identified, Song, providers};

/// Fetches one song into a folder.
#[async_trait]
pub trait AudioSource: Send + Sync {
    fn name(&self) -> &str;

    /// Download `song` to `dest_dir/<stem>.<ext>` and return the final path.
    async fn fetch(&self, song: &Song, dest_dir: &Path, stem: &str) -> Result<PathBuf>;
}

/// yt-dlp exit codes that no retry can fix.
fn terminal_exit(code: i32) -> Option<&'static str> {
    match code {
        2 => Some("invalid yt-dlp options"),
        100 => Some("yt-dlp needs to be updated"),
        101 => Some("no result within the duration bounds"),
        _ => None,
    }
}

/// yt-dlp backed source
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    program: String,
    ffmpeg: Option<String>,
    format: String,
    quality: u8,
    retries: u32,
    cookies_file: Option<PathBuf>,
    cookies_browser: Option<String>,
}

impl YtDlpSource {
    pub fn new(config: &DownloadConfig) -> Self {
        Self {
            program: config.youtube_dl_path.clone(),
            ffmpeg: Some(config.ffmpeg_path.clone()).filter(|p| !p.trim().is_empty()),
            format: config.format.clone(),
            quality: config.quality.min(10),
            retries: config.retries.max(1),
            cookies_file: config.cookies_file.clone(),
            cookies_browser: config.cookies_browser.clone().filter(|b| !b.trim().is_empty()),
        }
    }

    /// Whether the configured yt-dlp binary runs.
    pub async fn is_available(&self) -> bool {
        tokio::process::Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Video URL for a known YouTube id, otherwise a search query.
    fn search_target(song: &Song) -> String {
        if let Some(id) = song.id(providers::YOUTUBE) {
            return format!("https://youtube.com/watch?v={}", id);
        }
        let mut query = format!("{} (official audio)", song);
        if let Some(album) = &song.album {
            query.push_str(&format!(" ({})", album));
        }
        query.retain(|c| !matches!(c, '\\' | '/' | '<' | '>' | '|' | ':'));
        query
    }

    fn build_args(&self, song: &Song, dest_dir: &Path, stem: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if let Some(file) = &self.cookies_file {
            args.push("--cookies".into());
            args.push(file.into());
        } else if let Some(browser) = &self.cookies_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.into());
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.into());
        }

        args.extend(
            [
                "--quiet",
                "--no-warnings",
                "--default-search",
                "ytsearch1",
                "--no-playlist",
                "--max-downloads",
                "1",
            ]
            .map(OsString::from),
        );

        match song.duration.filter(|d| *d > 0.0) {
            Some(secs) => {
                let secs = secs.round() as i64;
                args.push("--match-filters".into());
                args.push(format!("duration<={}&duration>={}", secs + 10, (secs - 10).max(0)).into());
            }
            None => {
                // Skip shorts
                args.push("--break-match-filters".into());
                args.push("duration>=45".into());
            }
        }

        args.extend(["--extract-audio", "--format", "bestaudio/best", "--audio-format"].map(OsString::from));
        args.push((&self.format).into());
        args.push("--audio-quality".into());
        args.push(self.quality.to_string().into());
        args.push("--paths".into());
        args.push(dest_dir.into());
        args.push("--output".into());
        // yt-dlp expands `%(...)s` in the template, so literal percents are doubled
        args.push(format!("{}.%(ext)s", stem.replace('%', "%%")).into());

        // Target last so odd characters can't swallow flags
        args.push(Self::search_target(song).into());
        args
    }

    async fn run_once(&self, song: &Song, dest_dir: &Path, stem: &str) -> Result<Option<i32>> {
        let output = tokio::process::Command::new(&self.program)
            .args(self.build_args(song, dest_dir, stem))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::provider("yt-dlp", format!("failed to run {}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(None);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!("yt-dlp stderr for '{}': {}", song, stderr.trim());
        Ok(Some(output.status.code().unwrap_or(-1)))
    }
}

#[async_trait]
impl AudioSource for YtDlpSource {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(&self, song: &Song, dest_dir: &Path, stem: &str) -> Result<PathBuf> {
        let expected = dest_dir.join(format!("{}.{}", stem, self.format));
        tokio::fs::create_dir_all(dest_dir).await?;

        for attempt in 1..=self.retries {
            match self.run_once(song, dest_dir, stem).await? {
                None if expected.exists() => return Ok(expected),
                None => {
                    tracing::warn!("yt-dlp finished but produced no file for '{}'", song);
                }
                Some(code) => {
                    if let Some(reason) = terminal_exit(code) {
                        return Err(Error::download(song.to_string(), reason));
                    }
                    tracing::warn!(
                        "yt-dlp exited with {} for '{}' (attempt {}/{})",
                        code,
                        song,
                        attempt,
                        self.retries
                    );
                }
            }
            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
        }

        Err(Error::download(
            song.to_string(),
            format!("no file after {} attempts", self.retries),
        ))
    }
}
