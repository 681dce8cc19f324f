//! Audio file tag reading and writing.
//!
//! Uses the lofty crate for format-independent metadata access, so the same
//! code tags MP3 (ID3v2), FLAC, M4A and Ogg files.

use std::io::Cursor;
use std::path::Path;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};

use crate::error::{Error, Result};
use crate::model::{Artist, Identified, Song, providers};

/// Comment stored on liked songs.
///
/// A comment maps onto a native frame in every format lofty writes (COMM,
/// Vorbis `COMMENT`, MP4 `©cmt`), unlike a rating, which ID3v2 only accepts
/// as a binary POPM frame.
pub const LIKED_COMMENT: &str = "crate-digger:liked";

/// Tags read from a local file.
#[derive(Debug, Clone, Default)]
pub struct FileTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<f64>,
    pub recording_id: Option<String>,
    pub liked: bool,
}

impl FileTags {
    /// Song described by these tags; `fallback_title` is used when the
    /// file carries no title.
    pub fn into_song(self, fallback_title: &str) -> Song {
        let mut song = Song::new(
            self.title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| fallback_title.to_string()),
        );
        if let Some(artist) = self.artist {
            song.set_artist(Artist::new(artist));
        }
        song.album = self.album.filter(|a| !a.trim().is_empty());
        song.duration = self.duration.filter(|d| *d > 0.0);
        if let Some(id) = self.recording_id {
            song.add_id(providers::MUSICBRAINZ, &id);
        }
        song
    }
}

pub fn read(path: &Path) -> Result<FileTags> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file: {}", e)))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read tags: {}", e)))?;

    let duration = tagged_file.properties().duration().as_secs_f64();
    let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
        return Ok(FileTags {
            duration: Some(duration),
            ..Default::default()
        });
    };

    Ok(FileTags {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        duration: Some(duration),
        recording_id: tag
            .get_string(&ItemKey::MusicBrainzRecordingId)
            .map(str::to_string),
        liked: tag.comment().is_some_and(|c| c.trim() == LIKED_COMMENT),
    })
}

/// Write a song's metadata into a downloaded file.
///
/// Existing values are overwritten: the collection is the source of truth
/// for files it downloaded itself.
pub fn write(path: &Path, song: &Song, liked: bool, cover: Option<&[u8]>) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file: {}", e)))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file for tagging: {}", e)))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged_file.tag_mut(tag_type) else {
        return Err(Error::metadata(path, "format does not accept tags"));
    };

    tag.set_title(song.name.clone());
    if let Some(artist) = &song.artist {
        tag.set_artist(artist.name.clone());
    }
    if let Some(album) = &song.album {
        tag.set_album(album.clone());
    }
    if let Some(id) = song.id(providers::MUSICBRAINZ) {
        tag.insert_text(ItemKey::MusicBrainzRecordingId, id.to_string());
    }
    if liked {
        tag.set_comment(LIKED_COMMENT.to_string());
    } else if tag.comment().is_some_and(|c| c.trim() == LIKED_COMMENT) {
        tag.remove_comment();
    }

    if let Some(data) = cover {
        match Picture::from_reader(&mut Cursor::new(data)) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.remove_picture_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => tracing::warn!("Skipping unreadable cover for '{}': {}", song, e),
        }
    }

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| Error::metadata(path, format!("failed to save tags: {}", e)))?;

    tracing::debug!("Tagged {:?}", path);
    Ok(())
}
