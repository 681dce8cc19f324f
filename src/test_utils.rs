//! Test utilities and fixtures.
//!
//! Common builders for configurations and collections, so tests don't
//! repeat the same setup.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{test_config, sample_collection};
//!
//! #[test]
//! fn test_something() {
//!     let dir = tempfile::tempdir().unwrap();
//!     let config = test_config(dir.path());
//!     let collection = sample_collection();
//!     // ... test logic
//! }
//! ```

use std::path::Path;

use crate::collection::Collection;
use crate::config::Config;
use crate::matcher::Matcher;
use crate::model::{Album, Artist, Playlist, Song};

/// Configuration rooted in `dir`, with no network pacing.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.library.data_dir = dir.join("data");
    config.library.cache_dir = dir.join("cache");
    config.resolver.min_query_interval_ms = 0;
    config.resolver.retry_base_delay_ms = 1;
    config.download.folder = Some(dir.join("music"));
    config.download.threads = 2;
    config
}

/// Song with an artist.
pub fn song(name: &str, artist: &str) -> Song {
    Song::new(name).with_artist(Artist::new(artist))
}

/// Album whose songs are all credited to `artist`.
pub fn album(name: &str, artist: &str, songs: &[&str]) -> Album {
    let matcher = Matcher::default();
    let mut album = Album::new(name).with_artist(Artist::new(artist));
    for name in songs {
        album
            .add_song(song(name, artist), &matcher)
            .expect("fixture songs never conflict");
    }
    album
}

/// Small collection: one album, one playlist sharing a song with the album,
/// and liked songs inside and outside both.
pub fn sample_collection() -> Collection {
    let matcher = Matcher::default();
    let mut collection = Collection::new(matcher);

    collection
        .add_album(album("Blue", "Joni Mitchell", &["River", "California", "A Case of You"]))
        .expect("fixture album");

    let mut playlist = Playlist::new("Road Trip");
    playlist
        .add_song(song("California", "Joni Mitchell"), &matcher)
        .expect("fixture song");
    playlist
        .add_song(song("Weightless", "Marconi Union"), &matcher)
        .expect("fixture song");
    collection.add_playlist(playlist).expect("fixture playlist");

    collection
        .add_liked_song(song("River", "Joni Mitchell"))
        .expect("fixture liked song");
    collection
        .add_liked_song(song("Hurt", "Johnny Cash"))
        .expect("fixture liked song");

    collection
}
