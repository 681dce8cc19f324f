//! MusicBrainz catalog integration
//!
//! Searches artists, releases, recordings and release groups to fill in
//! ids, years, durations and cover art.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use adapter::cover_url;
pub use client::MusicBrainzCatalog;
