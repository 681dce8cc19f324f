//! Core data models for the music collection.
//!
//! Defines the primary entities: [`Song`], [`Artist`], [`Album`], [`Playlist`]
//! and the singleton [`LikedSongs`] container. All of them are plain serde
//! values; the on-disk shape is owned by [`crate::storage`].
//!
//! # Identity
//!
//! Entities never implement `PartialEq` or `Hash`. Whether two entities are
//! "the same" is decided by a [`Matcher`], which combines shared external ids
//! with fuzzy name similarity. Fuzzy equality is not transitive, so every
//! container scans its members with an explicit matcher instead of hashing.

mod album;
mod artist;
mod playlist;
mod song;

use std::collections::BTreeMap;

pub use album::Album;
pub use artist::Artist;
pub use playlist::{LikedSongs, PageCursor, Playlist, SongList};
pub use song::{DURATION_TOLERANCE_SECS, Song};

use crate::matcher::{self, Matcher};

/// Provider name → provider-native id.
pub type ExternalIds = BTreeMap<String, String>;

/// Well-known provider keys.
pub mod providers {
    pub const SPOTIFY: &str = "spotify";
    pub const YOUTUBE: &str = "youtube";
    pub const MUSICBRAINZ: &str = "mbid";
    pub const LASTFM: &str = "lastfm";
    pub const LOCAL: &str = "local";
}

/// Capability shared by every entity that carries a name and external ids.
pub trait Identified {
    fn name(&self) -> &str;
    fn ids(&self) -> &ExternalIds;
    fn ids_mut(&mut self) -> &mut ExternalIds;
    fn cover_image(&self) -> Option<&str>;

    /// Add a provider id, replacing any previous id for that provider.
    fn add_id(&mut self, provider: &str, id: &str) {
        if provider.is_empty() || id.is_empty() {
            return;
        }
        self.ids_mut().insert(provider.to_string(), id.to_string());
    }

    /// Merge an id map; values from `ids` win on collision.
    fn add_ids(&mut self, ids: &ExternalIds) {
        for (provider, id) in ids {
            self.add_id(provider, id);
        }
    }

    fn id(&self, provider: &str) -> Option<&str> {
        self.ids().get(provider).map(String::as_str)
    }

    /// Stable key: the first provider id, otherwise the normalized name.
    fn key(&self) -> String {
        match self.ids().iter().next() {
            Some((provider, id)) => format!("{}:{}", provider, id),
            None => matcher::normalize(self.name()),
        }
    }
}

/// Entities that can be located in a container by a [`Matcher`].
pub trait Matchable: Identified {
    fn matches(&self, other: &Self, matcher: &Matcher) -> bool;
}

/// Index of the first member Matcher-equal to `candidate`.
pub(crate) fn position<T: Matchable>(items: &[T], candidate: &T, matcher: &Matcher) -> Option<usize> {
    items.iter().position(|item| item.matches(candidate, matcher))
}

/// Longest stem in bytes; leaves room for an extension within the usual
/// 255-byte file name limit.
const MAX_STEM_BYTES: usize = 200;

/// Sanitizes a name for use as a file or folder name.
///
/// Path separators and characters Windows rejects are replaced with `_`,
/// surrounding whitespace and dots are trimmed, and the result is cut at a
/// character boundary to at most 200 bytes. Returns `None` when nothing
/// usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let mut sanitized = String::with_capacity(name.len().min(MAX_STEM_BYTES));
    for c in name.chars() {
        let c = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if sanitized.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        sanitized.push(c);
    }
    let trimmed = sanitized.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Sanitized name, or a short hex digest of the entity key when the name
/// has no usable characters.
pub(crate) fn file_stem<T: Identified>(entity: &T, display: &str) -> String {
    use sha2::{Digest, Sha256};
    sanitize_filename(display).unwrap_or_else(|| {
        let digest = Sha256::digest(entity.key().as_bytes());
        digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
    })
}
