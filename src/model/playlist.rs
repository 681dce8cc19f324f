use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ExternalIds, Identified, Matchable, Song, position};
use crate::error::{Error, Result};
use crate::matcher::Matcher;

/// Ordered, deduplicated list of songs.
///
/// Insertion order is track order. Inserting a song that is Matcher-equal to
/// an existing member merges the two instead of appending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongList(Vec<Song>);

impl SongList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a song, merging it into an existing match.
    ///
    /// A song without a name is refused: it would match every other
    /// nameless song.
    pub fn add(&mut self, song: Song, matcher: &Matcher) -> Result<()> {
        if song.is_empty() {
            return Err(Error::invalid_entity(format!(
                "song without a name ({} ids)",
                song.ids.len()
            )));
        }
        match position(&self.0, &song, matcher) {
            Some(idx) => self.0[idx].merge(song, matcher),
            None => {
                self.0.push(song);
                Ok(())
            }
        }
    }

    /// Insert every song or none of them.
    ///
    /// Fuzzy matching is not transitive, so a song inserted early can make a
    /// later one conflict; the whole batch is applied to a copy first.
    pub fn add_all(&mut self, songs: impl IntoIterator<Item = Song>, matcher: &Matcher) -> Result<()> {
        let mut merged = self.clone();
        for song in songs {
            merged.add(song, matcher)?;
        }
        *self = merged;
        Ok(())
    }

    pub fn remove(&mut self, song: &Song, matcher: &Matcher) -> Option<Song> {
        position(&self.0, song, matcher).map(|idx| self.0.remove(idx))
    }

    pub fn get(&self, song: &Song, matcher: &Matcher) -> Option<&Song> {
        position(&self.0, song, matcher).map(|idx| &self.0[idx])
    }

    pub fn get_mut(&mut self, song: &Song, matcher: &Matcher) -> Option<&mut Song> {
        position(&self.0, song, matcher).map(move |idx| &mut self.0[idx])
    }

    pub fn contains(&self, song: &Song, matcher: &Matcher) -> bool {
        self.get(song, matcher).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Song> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Song> {
        self.0.iter_mut()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Sum of member durations; unknown durations count as zero.
    pub fn total_duration(&self) -> f64 {
        self.0.iter().map(Song::duration_secs).sum()
    }

    pub fn into_vec(self) -> Vec<Song> {
        self.0
    }
}

impl<'a> IntoIterator for &'a SongList {
    type Item = &'a Song;
    type IntoIter = std::slice::Iter<'a, Song>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for SongList {
    type Item = Song;
    type IntoIter = std::vec::IntoIter<Song>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Provider continuation tokens from the last import.
///
/// Persisted so an interrupted import can resume, never part of identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageCursor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_page_token: Option<String>,
    pub spotify_page_offset: u32,
}

impl PageCursor {
    /// Keep the furthest position of both cursors.
    pub fn advance_to(&mut self, other: PageCursor) {
        if other.youtube_page_token.is_some() {
            self.youtube_page_token = other.youtube_page_token;
        }
        self.spotify_page_offset = self.spotify_page_offset.max(other.spotify_page_offset);
    }
}

/// A user playlist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Playlist {
    pub name: String,
    pub songs: SongList,
    pub ids: ExternalIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub cursor: PageCursor,
}

impl Playlist {
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

    pub fn add_song(&mut self, song: Song, matcher: &Matcher) -> Result<()> {
        self.songs.add(song, matcher)
    }

    pub fn add_songs(
        &mut self,
        songs: impl IntoIterator<Item = Song>,
        matcher: &Matcher,
    ) -> Result<()> {
        self.songs.add_all(songs, matcher)
    }

    pub fn remove_song(&mut self, song: &Song, matcher: &Matcher) -> Option<Song> {
        self.songs.remove(song, matcher)
    }

    pub fn contains(&self, song: &Song, matcher: &Matcher) -> bool {
        self.songs.contains(song, matcher)
    }

    pub fn get_song(&self, song: &Song, matcher: &Matcher) -> Option<&Song> {
        self.songs.get(song, matcher)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.songs.total_duration()
    }

    pub fn folder_name(&self) -> String {
        super::file_stem(self, &self.name)
    }

    /// Absorb `other`: ids, a missing cover, the furthest cursor, and every
    /// song through the normal dedupe-on-insert path. On error `self` is
    /// unchanged.
    pub fn merge(&mut self, other: Playlist, matcher: &Matcher) -> Result<()> {
        let mut merged = self.clone();
        merged.songs.add_all(other.songs, matcher)?;
        merged.add_ids(&other.ids);
        if merged.cover_image.is_none() {
            merged.cover_image = other.cover_image;
        }
        merged.cursor.advance_to(other.cursor);
        *self = merged;
        Ok(())
    }
}

impl Identified for Playlist {
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

impl Matchable for Playlist {
    fn matches(&self, other: &Self, matcher: &Matcher) -> bool {
        matcher.matches(self, other)
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The user's liked songs. Exactly one per collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LikedSongs {
    pub songs: SongList,
}

impl LikedSongs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_song(&mut self, song: Song, matcher: &Matcher) -> Result<()> {
        self.songs.add(song, matcher)
    }

    pub fn add_songs(
        &mut self,
        songs: impl IntoIterator<Item = Song>,
        matcher: &Matcher,
    ) -> Result<()> {
        self.songs.add_all(songs, matcher)
    }

    pub fn remove_song(&mut self, song: &Song, matcher: &Matcher) -> Option<Song> {
        self.songs.remove(song, matcher)
    }

    pub fn contains(&self, song: &Song, matcher: &Matcher) -> bool {
        self.songs.contains(song, matcher)
    }

    pub fn get_song(&self, song: &Song, matcher: &Matcher) -> Option<&Song> {
        self.songs.get(song, matcher)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.songs.total_duration()
    }

    pub fn clear(&mut self) {
        self.songs.clear();
    }
}
