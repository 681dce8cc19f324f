//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.

use super::dto;
use crate::model::{Album, Artist, Identified, Song, providers};

/// Results scoring below this are treated as no match.
pub const MIN_SCORE: u32 = 80;

/// Cover Art Archive front image for a release.
pub fn cover_url(release_id: &str) -> String {
    format!("https://coverartarchive.org/release/{}/front", release_id)
}

fn accepted(score: Option<u32>) -> bool {
    score.unwrap_or(100) >= MIN_SCORE
}

/// Parse the year out of `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
pub fn parse_year(date: Option<&str>) -> Option<i32> {
    date?.get(0..4)?.parse().ok()
}

fn to_artist(artist: dto::Artist) -> Artist {
    Artist::new(artist.name).with_id(providers::MUSICBRAINZ, &artist.id)
}

fn credited_artists(credits: Vec<dto::ArtistCredit>) -> Vec<Artist> {
    credits.into_iter().map(|c| to_artist(c.artist)).collect()
}

/// Best artist hit
pub fn first_artist(response: dto::ArtistSearch) -> Option<Artist> {
    response
        .artists
        .into_iter()
        .find(|a| accepted(a.score))
        .map(to_artist)
}

/// Best release hit, as an album without tracks
pub fn first_album(response: dto::ReleaseSearch) -> Option<Album> {
    let release = response.releases.into_iter().find(|r| accepted(r.score))?;
    let mut album = Album::new(release.title);
    album.add_id(providers::MUSICBRAINZ, &release.id);
    album.year = parse_year(release.date.as_deref());
    album.cover_image = Some(cover_url(&release.id));
    album.artists = credited_artists(release.artist_credit);
    Some(album)
}

/// Best recording hit
pub fn first_song(response: dto::RecordingSearch) -> Option<Song> {
    let recording = response.recordings.into_iter().find(|r| accepted(r.score))?;
    let mut song = Song::new(recording.title).with_id(providers::MUSICBRAINZ, &recording.id);
    song.duration = recording.length.map(|ms| ms as f64 / 1000.0);
    if let Some(credit) = recording.artist_credit.into_iter().next() {
        song.set_artist(to_artist(credit.artist));
    }
    if let Some(release) = recording.releases.into_iter().next() {
        song.cover_image = Some(cover_url(&release.id));
        song.album = Some(release.title);
    }
    Some(song)
}

/// Album release groups
pub fn albums(response: dto::ReleaseGroupSearch) -> Vec<Album> {
    response
        .release_groups
        .into_iter()
        .filter(|rg| accepted(rg.score))
        .map(|rg| {
            let mut album = Album::new(rg.title);
            album.add_id(providers::MUSICBRAINZ, &rg.id);
            album.year = parse_year(rg.first_release_date.as_deref());
            album.artists = credited_artists(rg.artist_credit);
            album
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(name: &str, id: &str) -> dto::ArtistCredit {
        dto::ArtistCredit {
            name: None,
            artist: dto::Artist {
                id: id.to_string(),
                name: name.to_string(),
                score: None,
                sort_name: None,
            },
        }
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year(Some("1998-04-20")), Some(1998));
        assert_eq!(parse_year(Some("2001")), Some(2001));
        assert_eq!(parse_year(Some("")), None);
        assert_eq!(parse_year(None), None);
    }

    #[test]
    fn test_first_song_converts_fields() {
        let response = dto::RecordingSearch {
            recordings: vec![dto::Recording {
                id: "rec-1".into(),
                title: "Teardrop".into(),
                score: Some(100),
                length: Some(330_500),
                artist_credit: vec![credit("Massive Attack", "art-1")],
                releases: vec![dto::ReleaseRef {
                    id: "rel-1".into(),
                    title: "Mezzanine".into(),
                }],
            }],
        };

        let song = first_song(response).unwrap();
        assert_eq!(song.id("mbid"), Some("rec-1"));
        assert_eq!(song.duration, Some(330.5));
        assert_eq!(song.album.as_deref(), Some("Mezzanine"));
        assert_eq!(song.artist.unwrap().id("mbid"), Some("art-1"));
        assert_eq!(
            song.cover_image.as_deref(),
            Some("https://coverartarchive.org/release/rel-1/front")
        );
    }

    #[test]
    fn test_low_scores_are_rejected() {
        let response = dto::ArtistSearch {
            artists: vec![dto::Artist {
                id: "a".into(),
                name: "Someone Else".into(),
                score: Some(40),
                sort_name: None,
            }],
        };
        assert!(first_artist(response).is_none());
    }

    #[test]
    fn test_first_album_reads_year_and_artists() {
        let response = dto::ReleaseSearch {
            releases: vec![dto::Release {
                id: "rel-1".into(),
                title: "Mezzanine".into(),
                score: Some(95),
                date: Some("1998-04-20".into()),
                artist_credit: vec![credit("Massive Attack", "art-1")],
                release_group: None,
                track_count: Some(11),
            }],
        };

        let album = first_album(response).unwrap();
        assert_eq!(album.year, Some(1998));
        assert_eq!(album.main_artist().unwrap().name, "Massive Attack");
    }
}
