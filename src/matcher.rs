//! Fuzzy identity for music entities.
//!
//! Two entities are the same when they share a provider id, or failing that
//! when their normalized names are close enough by Levenshtein similarity.
//! The relation is reflexive and commutative but not transitive, which is why
//! nothing in the model hashes on it.

use crate::model::{Album, Artist, Identified, Playlist, Song};

/// Default similarity threshold, in percent.
pub const DEFAULT_THRESHOLD: f64 = 90.0;

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rows are enough
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity of two names in percent (0 to 100) after normalization.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let distance = levenshtein(&a, &b);
    (1.0 - distance as f64 / max_len as f64) * 100.0
}

/// Decides entity equality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matcher {
    threshold: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl Matcher {
    /// Create a matcher; the threshold is clamped to 0..=100.
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_nan() {
            DEFAULT_THRESHOLD
        } else {
            threshold.clamp(0.0, 100.0)
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn names_match(&self, a: &str, b: &str) -> bool {
        similarity(a, b) >= self.threshold
    }

    /// Shared `(provider, id)` pair, otherwise name similarity.
    pub fn matches<T: Identified + ?Sized>(&self, a: &T, b: &T) -> bool {
        if share_id(a, b) {
            return true;
        }
        self.names_match(a.name(), b.name())
    }

    /// Missing artists on either side never prevent a match.
    pub fn artists_match(&self, a: Option<&Artist>, b: Option<&Artist>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.matches(a, b),
            _ => true,
        }
    }

    /// Songs match on a shared id, or on name plus compatible artist.
    /// Duration plays no part.
    pub fn songs_match(&self, a: &Song, b: &Song) -> bool {
        if share_id(a, b) {
            return true;
        }
        self.names_match(&a.name, &b.name)
            && self.artists_match(a.artist.as_ref(), b.artist.as_ref())
    }

    /// Albums match on a shared id, or on name plus compatible main artist.
    pub fn albums_match(&self, a: &Album, b: &Album) -> bool {
        if share_id(a, b) {
            return true;
        }
        self.names_match(&a.name, &b.name)
            && self.artists_match(a.main_artist(), b.main_artist())
    }

    pub fn playlists_match(&self, a: &Playlist, b: &Playlist) -> bool {
        self.matches(a, b)
    }
}

fn share_id<T: Identified + ?Sized>(a: &T, b: &T) -> bool {
    a.ids()
        .iter()
        .any(|(provider, id)| b.ids().get(provider) == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  The   Beatles "), "the beatles");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("björk", "bjork"), 1);
    }

    #[test]
    fn test_similarity_scale() {
        assert_eq!(similarity("", ""), 100.0);
        assert_eq!(similarity("Abc", "abc"), 100.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert!((similarity("kitten", "sitting") - (1.0 - 3.0 / 7.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(Matcher::new(150.0).threshold(), 100.0);
        assert_eq!(Matcher::new(-3.0).threshold(), 0.0);
        assert_eq!(Matcher::new(f64::NAN).threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_shared_id_beats_names() {
        let m = Matcher::new(100.0);
        let a = Song::new("Completely different").with_id("spotify", "x1");
        let b = Song::new("Nothing alike").with_id("spotify", "x1");
        assert!(m.songs_match(&a, &b));
    }

    #[test]
    fn test_different_ids_fall_back_to_names() {
        let m = Matcher::default();
        let a = Artist::new("Radiohead").with_id("spotify", "a");
        let b = Artist::new("radiohead").with_id("spotify", "b");
        assert!(m.matches(&a, &b));
    }

    #[test]
    fn test_songs_need_compatible_artists() {
        let m = Matcher::default();
        let a = Song::new("Hurt").with_artist(Artist::new("Nine Inch Nails"));
        let b = Song::new("Hurt").with_artist(Artist::new("Johnny Cash"));
        let c = Song::new("Hurt");
        assert!(!m.songs_match(&a, &b));
        assert!(m.songs_match(&a, &c));
        assert!(m.songs_match(&c, &b));
    }

    #[test]
    fn test_duration_is_ignored() {
        let m = Matcher::default();
        let a = Song::new("Hurt").with_duration(100.0);
        let b = Song::new("Hurt").with_duration(900.0);
        assert!(m.songs_match(&a, &b));
    }

    #[test]
    fn test_albums_compare_main_artist() {
        let m = Matcher::default();
        let mut a = Album::new("Greatest Hits");
        a.artists.push(Artist::new("Queen"));
        let mut b = Album::new("Greatest Hits");
        b.artists.push(Artist::new("ABBA"));
        assert!(!m.albums_match(&a, &b));

        b.artists.insert(0, Artist::new("queen"));
        assert!(m.albums_match(&a, &b));
    }

    #[test]
    fn test_nontransitive_example() {
        let m = Matcher::new(80.0);
        // Each step is one edit in five chars
        assert!(m.names_match("abcde", "abcdx"));
        assert!(m.names_match("abcdx", "abcyx"));
        assert!(!m.names_match("abcde", "abcyx"));
    }

    proptest! {
        #[test]
        fn prop_reflexive(name in ".{0,40}", threshold in 0.0f64..=100.0) {
            let m = Matcher::new(threshold);
            let song = Song::new(name.clone()).with_artist(Artist::new(name));
            prop_assert!(m.songs_match(&song, &song));
        }

        #[test]
        fn prop_commutative(a in "[a-z ]{0,20}", b in "[a-z ]{0,20}", threshold in 0.0f64..=100.0) {
            let m = Matcher::new(threshold);
            prop_assert_eq!(m.names_match(&a, &b), m.names_match(&b, &a));
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        #[test]
        fn prop_monotonic_in_threshold(
            a in "[a-z]{0,15}",
            b in "[a-z]{0,15}",
            low in 0.0f64..=100.0,
            high in 0.0f64..=100.0,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            if Matcher::new(high).names_match(&a, &b) {
                prop_assert!(Matcher::new(low).names_match(&a, &b));
            }
        }

        #[test]
        fn prop_shared_id_always_matches(
            a in ".{0,20}",
            b in ".{0,20}",
            id in "[a-z0-9]{1,12}",
        ) {
            let m = Matcher::new(100.0);
            let x = Album::new(a).with_id("mbid", &id);
            let y = Album::new(b).with_id("mbid", &id);
            prop_assert!(m.albums_match(&x, &y));
        }

        #[test]
        fn prop_similarity_in_range(a in ".{0,30}", b in ".{0,30}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=100.0).contains(&s));
        }
    }
}
