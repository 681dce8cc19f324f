//! The canonical store: one deduplicated library built from every source.
//!
//! Albums, playlists and liked songs each form a set in which no two members
//! are Matcher-equal. Inserting a member that matches an existing one merges
//! it into the existing one. Standalone songs (liked or playlist songs that
//! belong to no album) are derived on demand and drive the download layout.

use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::model::{Album, LikedSongs, Matchable, Playlist, Song};

#[derive(Debug, Clone, Default)]
pub struct Collection {
    matcher: Matcher,
    albums: Vec<Album>,
    playlists: Vec<Playlist>,
    liked_songs: LikedSongs,
}

/// Merge `item` into its Matcher-equal member, or append it.
fn upsert<T: Matchable>(
    items: &mut Vec<T>,
    item: T,
    matcher: &Matcher,
    merge: impl FnOnce(&mut T, T, &Matcher) -> Result<()>,
) -> Result<()> {
    match items.iter().position(|existing| existing.matches(&item, matcher)) {
        Some(idx) => merge(&mut items[idx], item, matcher),
        None => {
            items.push(item);
            Ok(())
        }
    }
}

impl Collection {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            ..Default::default()
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn liked_songs(&self) -> &LikedSongs {
        &self.liked_songs
    }

    /// Mutable access for enrichment. Callers must not rename members into
    /// duplicates of each other.
    pub fn albums_mut(&mut self) -> &mut [Album] {
        &mut self.albums
    }

    pub fn playlists_mut(&mut self) -> &mut [Playlist] {
        &mut self.playlists
    }

    pub fn liked_songs_mut(&mut self) -> &mut LikedSongs {
        &mut self.liked_songs
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty() && self.playlists.is_empty() && self.liked_songs.is_empty()
    }

    // ------------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------------

    pub fn add_album(&mut self, album: Album) -> Result<()> {
        if album.name.trim().is_empty() {
            return Err(Error::invalid_entity(format!(
                "album without a name ({} songs)",
                album.len()
            )));
        }
        upsert(&mut self.albums, album, &self.matcher, Album::merge)
    }

    /// Insert every album or none of them.
    pub fn add_albums(&mut self, albums: impl IntoIterator<Item = Album>) -> Result<()> {
        let mut albums_after = self.albums.clone();
        for album in albums {
            if album.name.trim().is_empty() {
                return Err(Error::invalid_entity("album without a name"));
            }
            upsert(&mut albums_after, album, &self.matcher, Album::merge)?;
        }
        self.albums = albums_after;
        Ok(())
    }

    pub fn get_album(&self, album: &Album) -> Option<&Album> {
        self.albums.iter().find(|a| a.matches(album, &self.matcher))
    }

    pub fn get_album_mut(&mut self, album: &Album) -> Option<&mut Album> {
        let matcher = self.matcher;
        self.albums.iter_mut().find(|a| a.matches(album, &matcher))
    }

    pub fn remove_album(&mut self, album: &Album) -> Option<Album> {
        let idx = self.albums.iter().position(|a| a.matches(album, &self.matcher))?;
        Some(self.albums.remove(idx))
    }

    /// Album holding `song`: by the song's album name first, then by
    /// membership.
    pub fn song_album(&self, song: &Song) -> Option<&Album> {
        if let Some(name) = &song.album
            && let Some(album) = self
                .albums
                .iter()
                .find(|a| self.matcher.names_match(&a.name, name) && a.contains(song, &self.matcher))
        {
            return Some(album);
        }
        self.albums.iter().find(|a| a.contains(song, &self.matcher))
    }

    pub fn clear_albums(&mut self) {
        self.albums.clear();
    }

    // ------------------------------------------------------------------------
    // Playlists
    // ------------------------------------------------------------------------

    pub fn add_playlist(&mut self, playlist: Playlist) -> Result<()> {
        if playlist.name.trim().is_empty() {
            return Err(Error::invalid_entity(format!(
                "playlist without a name ({} songs)",
                playlist.len()
            )));
        }
        upsert(&mut self.playlists, playlist, &self.matcher, Playlist::merge)
    }

    /// Insert every playlist or none of them.
    pub fn add_playlists(&mut self, playlists: impl IntoIterator<Item = Playlist>) -> Result<()> {
        let mut playlists_after = self.playlists.clone();
        for playlist in playlists {
            if playlist.name.trim().is_empty() {
                return Err(Error::invalid_entity("playlist without a name"));
            }
            upsert(&mut playlists_after, playlist, &self.matcher, Playlist::merge)?;
        }
        self.playlists = playlists_after;
        Ok(())
    }

    pub fn get_playlist(&self, playlist: &Playlist) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.matches(playlist, &self.matcher))
    }

    pub fn get_playlist_mut(&mut self, playlist: &Playlist) -> Option<&mut Playlist> {
        let matcher = self.matcher;
        self.playlists.iter_mut().find(|p| p.matches(playlist, &matcher))
    }

    pub fn remove_playlist(&mut self, playlist: &Playlist) -> Option<Playlist> {
        let idx = self
            .playlists
            .iter()
            .position(|p| p.matches(playlist, &self.matcher))?;
        Some(self.playlists.remove(idx))
    }

    /// First playlist containing `song`.
    pub fn song_playlist(&self, song: &Song) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.contains(song, &self.matcher))
    }

    pub fn clear_playlists(&mut self) {
        self.playlists.clear();
    }

    // ------------------------------------------------------------------------
    // Liked songs
    // ------------------------------------------------------------------------

    pub fn add_liked_song(&mut self, song: Song) -> Result<()> {
        self.liked_songs.add_song(song, &self.matcher)
    }

    pub fn add_liked_songs(&mut self, songs: impl IntoIterator<Item = Song>) -> Result<()> {
        self.liked_songs.add_songs(songs, &self.matcher)
    }

    pub fn get_liked_song(&self, song: &Song) -> Option<&Song> {
        self.liked_songs.get_song(song, &self.matcher)
    }

    pub fn remove_liked_song(&mut self, song: &Song) -> Option<Song> {
        self.liked_songs.remove_song(song, &self.matcher)
    }

    pub fn is_liked(&self, song: &Song) -> bool {
        self.liked_songs.contains(song, &self.matcher)
    }

    pub fn clear_liked_songs(&mut self) {
        self.liked_songs.clear();
    }

    // ------------------------------------------------------------------------
    // Cross-set queries
    // ------------------------------------------------------------------------

    /// Canonical instance of `song` from albums, then playlists, then liked
    /// songs.
    pub fn get_song(&self, song: &Song) -> Option<&Song> {
        self.albums
            .iter()
            .find_map(|a| a.get_song(song, &self.matcher))
            .or_else(|| {
                self.playlists
                    .iter()
                    .find_map(|p| p.get_song(song, &self.matcher))
            })
            .or_else(|| self.get_liked_song(song))
    }

    fn in_any_album(&self, song: &Song) -> bool {
        self.albums.iter().any(|a| a.contains(song, &self.matcher))
    }

    fn in_any_playlist(&self, song: &Song) -> bool {
        self.playlists.iter().any(|p| p.contains(song, &self.matcher))
    }

    /// Liked songs that belong to no album.
    pub fn standalone_liked_songs(&self) -> Vec<&Song> {
        self.liked_songs
            .songs
            .iter()
            .filter(|s| !self.in_any_album(s))
            .collect()
    }

    /// Liked songs that belong to no album and no playlist.
    pub fn standalone_liked_songs_excluding_playlists(&self) -> Vec<&Song> {
        self.liked_songs
            .songs
            .iter()
            .filter(|s| !self.in_any_album(s) && !self.in_any_playlist(s))
            .collect()
    }

    /// Songs of `playlist` that belong to no album.
    pub fn standalone_playlist_songs<'a>(&self, playlist: &'a Playlist) -> Vec<&'a Song> {
        playlist
            .songs
            .iter()
            .filter(|s| !self.in_any_album(s))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------------

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn playlist_count(&self) -> usize {
        self.playlists.len()
    }

    pub fn liked_song_count(&self) -> usize {
        self.liked_songs.len()
    }

    pub fn albums_track_count(&self) -> usize {
        self.albums.iter().map(Album::len).sum()
    }

    pub fn playlists_track_count(&self) -> usize {
        self.playlists.iter().map(Playlist::len).sum()
    }

    /// Number of files a full download produces.
    ///
    /// A song shared by two playlists is still counted once per playlist,
    /// since each playlist folder gets its own copy.
    pub fn total_track_count(&self) -> usize {
        let playlist_songs: usize = self
            .playlists
            .iter()
            .map(|p| self.standalone_playlist_songs(p).len())
            .sum();
        self.standalone_liked_songs_excluding_playlists().len()
            + playlist_songs
            + self.albums_track_count()
    }

    // ------------------------------------------------------------------------
    // Whole-store operations
    // ------------------------------------------------------------------------

    /// Union `other` into this store through the normal insertion path.
    ///
    /// The union is built on a copy; on any conflict the store is left as it
    /// was and the error is returned.
    pub fn merge_collection(&mut self, other: Collection) -> Result<()> {
        let mut merged = self.clone();
        merged.add_albums(other.albums)?;
        merged.add_playlists(other.playlists)?;
        merged.add_liked_songs(other.liked_songs.songs)?;
        *self = merged;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.clear_albums();
        self.clear_playlists();
        self.clear_liked_songs();
    }
}
