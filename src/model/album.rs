use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Artist, ExternalIds, Identified, Matchable, Song, SongList};
use crate::error::{Error, Result};
use crate::matcher::Matcher;

/// An album: ordered tracks plus credited artists.
///
/// The first artist is the main artist and is what album matching and the
/// folder layout use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub name: String,
    pub artists: Vec<Artist>,
    pub songs: SongList,
    pub ids: ExternalIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

impl Album {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_artist(mut self, artist: Artist) -> Self {
        self.add_artist(artist, &Matcher::default());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_id(mut self, provider: &str, id: &str) -> Self {
        self.add_id(provider, id);
        self
    }

    pub fn main_artist(&self) -> Option<&Artist> {
        self.artists.first()
    }

    /// Credit an artist, merging into an existing Matcher-equal credit.
    pub fn add_artist(&mut self, artist: Artist, matcher: &Matcher) {
        if artist.is_empty() {
            return;
        }
        match super::position(&self.artists, &artist, matcher) {
            Some(idx) => self.artists[idx].merge(artist),
            None => self.artists.push(artist),
        }
    }

    /// Insert a track. A track artist not yet credited is added to the
    /// album's artists once the track is in.
    pub fn add_song(&mut self, song: Song, matcher: &Matcher) -> Result<()> {
        let artist = song.artist.clone();
        self.songs.add(song, matcher)?;
        if let Some(artist) = artist
            && super::position(&self.artists, &artist, matcher).is_none()
        {
            self.artists.push(artist);
        }
        Ok(())
    }

    /// Insert every track or none of them.
    pub fn add_songs(
        &mut self,
        songs: impl IntoIterator<Item = Song>,
        matcher: &Matcher,
    ) -> Result<()> {
        let mut merged = self.clone();
        for song in songs {
            merged.add_song(song, matcher)?;
        }
        *self = merged;
        Ok(())
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

    /// Folder name: `"Name (Artist)"` sanitized.
    pub fn folder_name(&self) -> String {
        super::file_stem(self, &self.to_string())
    }

    /// Reason why `other` cannot be merged into `self`, if any.
    pub fn conflict_with(&self, other: &Album) -> Option<String> {
        match (self.year, other.year) {
            (Some(a), Some(b)) if a != b => Some(format!("year {} vs {}", a, b)),
            _ => None,
        }
    }

    /// Absorb `other`. The merge is built on a copy and committed only when
    /// every track went in, so on error `self` is unchanged.
    pub fn merge(&mut self, other: Album, matcher: &Matcher) -> Result<()> {
        if let Some(reason) = self.conflict_with(&other) {
            return Err(Error::merge_conflict(self.to_string(), reason));
        }

        let mut merged = self.clone();
        for artist in other.artists {
            merged.add_artist(artist, matcher);
        }
        for song in other.songs {
            merged.add_song(song, matcher)?;
        }
        if merged.year.is_none() {
            merged.year = other.year;
        }
        if merged.cover_image.is_none() {
            merged.cover_image = other.cover_image;
        }
        merged.add_ids(&other.ids);
        *self = merged;
        Ok(())
    }
}

impl Identified for Album {
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

impl Matchable for Album {
    fn matches(&self, other: &Self, matcher: &Matcher) -> bool {
        matcher.albums_match(self, other)
    }
}

impl fmt::Display for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.main_artist() {
            Some(artist) => write!(f, "{} ({})", self.name, artist.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> Matcher {
        Matcher::new(90.0)
    }

    fn track(name: &str, artist: &str) -> Song {
        Song::new(name).with_artist(Artist::new(artist))
    }

    #[test]
    fn test_display_and_folder_name() {
        let album = Album::new("Back in Black").with_artist(Artist::new("AC/DC"));
        assert_eq!(album.to_string(), "Back in Black (AC/DC)");
        assert_eq!(album.folder_name(), "Back in Black (AC_DC)");
    }

    #[test]
    fn test_add_song_credits_new_artist() {
        let m = matcher();
        let mut album = Album::new("Collab").with_artist(Artist::new("Daft Punk"));
        album.add_song(track("Get Lucky", "Daft Punk"), &m).unwrap();
        album.add_song(track("Instant Crush", "Julian Casablancas"), &m).unwrap();

        assert_eq!(album.artists.len(), 2);
        assert_eq!(album.main_artist().unwrap().name, "Daft Punk");
    }

    #[test]
    fn test_add_song_is_idempotent() {
        let m = matcher();
        let mut album = Album::new("Discovery");
        album.add_song(track("One More Time", "Daft Punk"), &m).unwrap();
        album.add_song(track("One More Time", "Daft Punk"), &m).unwrap();
        assert_eq!(album.len(), 1);
    }

    #[test]
    fn test_merge_adopts_year_and_songs() {
        let m = matcher();
        let mut a = Album::new("Blue").with_artist(Artist::new("Joni Mitchell"));
        a.add_song(track("River", "Joni Mitchell"), &m).unwrap();
        let mut b = Album::new("Blue")
            .with_artist(Artist::new("Joni Mitchell").with_id("mbid", "j-1"))
            .with_year(1971)
            .with_id("spotify", "alb-1");
        b.add_song(track("River", "Joni Mitchell").with_duration(240.0), &m).unwrap();
        b.add_song(track("California", "Joni Mitchell"), &m).unwrap();

        a.merge(b, &m).unwrap();

        assert_eq!(a.year, Some(1971));
        assert_eq!(a.len(), 2);
        assert_eq!(a.id("spotify"), Some("alb-1"));
        assert_eq!(a.main_artist().unwrap().id("mbid"), Some("j-1"));
        assert_eq!(a.songs.iter().next().unwrap().duration, Some(240.0));
    }

    #[test]
    fn test_merge_year_conflict() {
        let m = matcher();
        let mut a = Album::new("Blue").with_year(1971);
        let b = Album::new("Blue").with_year(1999).with_id("spotify", "x");

        let err = a.merge(b, &m).unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
        assert!(a.ids.is_empty());
    }

    #[test]
    fn test_merge_song_conflict_leaves_album_untouched() {
        let m = matcher();
        let mut a = Album::new("Blue");
        a.add_song(track("River", "Joni Mitchell").with_duration(240.0), &m).unwrap();
        let mut b = Album::new("Blue").with_year(1971);
        b.add_song(track("California", "Joni Mitchell"), &m).unwrap();
        b.add_song(track("River", "Joni Mitchell").with_duration(500.0), &m).unwrap();

        assert!(a.merge(b, &m).is_err());
        assert_eq!(a.len(), 1);
        assert_eq!(a.year, None);
    }

    #[test]
    fn test_failed_add_song_credits_no_artist() {
        let m = matcher();
        let mut album = Album::new("Untitled");
        album.add_song(Song::new("Intro").with_duration(100.0), &m).unwrap();

        let err = album
            .add_song(track("Intro", "Stranger").with_duration(400.0), &m)
            .unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
        assert!(album.artists.is_empty());
        assert_eq!(album.len(), 1);
    }

    #[test]
    fn test_merge_is_atomic_under_non_transitive_matching() {
        let loose = Matcher::new(80.0);
        let mut a = Album::new("Letters");
        a.add_song(Song::new("abcde").with_duration(100.0), &loose).unwrap();
        a.add_song(Song::new("abcyx").with_duration(300.0), &matcher()).unwrap();

        // "vwxyq" only meets "vwxyz" after that track has been inserted
        let mut b = Album::new("Letters")
            .with_artist(Artist::new("Someone"))
            .with_id("spotify", "alb-9");
        b.add_song(Song::new("vwxyz").with_duration(300.0), &matcher()).unwrap();
        b.add_song(Song::new("vwxyq").with_duration(100.0), &matcher()).unwrap();

        let err = a.merge(b, &loose).unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
        assert_eq!(a.len(), 2);
        assert!(a.artists.is_empty());
        assert!(a.ids.is_empty());
    }

    #[test]
    fn test_total_duration() {
        let m = matcher();
        let mut album = Album::new("Short");
        album.add_song(track("A", "X").with_duration(60.0), &m).unwrap();
        album.add_song(track("B", "X"), &m).unwrap();
        assert_eq!(album.total_duration(), 60.0);
    }
}
