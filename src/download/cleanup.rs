//! Download folder housekeeping.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;

/// Extensions left behind by interrupted downloads.
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether `path` is a leftover from an unfinished download.
pub fn is_partial(path: &Path) -> bool {
    extension(path).is_some_and(|ext| PARTIAL_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether `suffix` (the file name after `<stem>.`) names a leftover of
/// the song itself: the bare audio format, or a run of short format tokens
/// ending in a partial extension (`mp3.part`, `f251.webm.part`, `ytdl`).
fn is_own_leftover(suffix: &str, format: &str) -> bool {
    if suffix.eq_ignore_ascii_case(format) {
        return true;
    }
    let segments: Vec<&str> = suffix.split('.').collect();
    let tokens_ok = segments
        .iter()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()));
    tokens_ok
        && segments
            .last()
            .is_some_and(|last| PARTIAL_EXTENSIONS.contains(&last.to_ascii_lowercase().as_str()))
}

/// Remove partial downloads of one song: `<stem>.<format>` and the partial
/// files yt-dlp leaves next to it. Files of other songs sharing the prefix
/// are never touched.
pub fn remove_partials(dir: &Path, stem: &str, format: &str) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let prefix = format!("{}.", stem);
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(suffix) = name.strip_prefix(&prefix) else {
            continue;
        };
        if path.is_file() && is_own_leftover(suffix, format) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Sweep a download folder.
///
/// Removes partial files, zero-byte audio files and then every empty
/// directory below `root`. `root` itself is kept.
pub fn clean_folder(root: &Path, format: &str) -> Result<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        let empty_audio =
            extension(path).as_deref() == Some(format) && entry.metadata().map(|m| m.len() == 0).unwrap_or(false);
        if is_partial(path) || empty_audio {
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!("Removed leftover {:?}", path);
                    removed += 1;
                }
                Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
            }
        }
    }

    // Children are visited before their parents
    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() {
            remove_empty_dir(entry.path())?;
        }
    }
    Ok(removed)
}

fn remove_empty_dir(path: &Path) -> Result<()> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
    }
    Ok(())
}

/// Delete audio files in `dir` (not recursive) whose stem is not in `keep`.
pub fn delete_stale(dir: &Path, keep: &HashSet<String>, format: &str) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || extension(&path).as_deref() != Some(format) {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if !keep.contains(stem) {
            tracing::info!("Deleting stale song {:?}", path);
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
