use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ExternalIds, Identified, Matchable};
use crate::matcher::Matcher;

/// A performing artist.
///
/// Created lazily when a song references an unseen artist name; only removed
/// when the whole collection is cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub name: String,
    pub ids: ExternalIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl Artist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, provider: &str, id: &str) -> Self {
        self.add_id(provider, id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// Absorb ids and a missing cover from `other`.
    pub fn merge(&mut self, other: Artist) {
        self.add_ids(&other.ids);
        if self.cover_image.is_none() {
            self.cover_image = other.cover_image;
        }
    }
}

impl Identified for Artist {
    fn name(&self) -> &str {
        &self.name
    }

    fn ids(&self) -> &ExternalIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut ExternalIds {
        &mut self.ids
    }

    fn cover_image(&self) -> Option<&str> {
        self.cover_image.as_deref()
    }
}

impl Matchable for Artist {
    fn matches(&self, other: &Self, matcher: &Matcher) -> bool {
        matcher.matches(self, other)
    }
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_existing_cover() {
        let mut artist = Artist::new("Björk");
        artist.cover_image = Some("mine.png".into());
        let mut other = Artist::new("Bjork").with_id("mbid", "87c5");
        other.cover_image = Some("theirs.png".into());

        artist.merge(other);

        assert_eq!(artist.cover_image.as_deref(), Some("mine.png"));
        assert_eq!(artist.id("mbid"), Some("87c5"));
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let json = r#"{"name":"Low","genre":"slowcore"}"#;
        let artist: Artist = serde_json::from_str(json).unwrap();
        assert_eq!(artist.name, "Low");
        assert!(artist.ids.is_empty());
    }
}
