//! Companion files written next to downloaded songs.
//!
//! Albums get a Kodi-style `album.nfo` and playlists an extended M3U. Both
//! are rendered to strings here; the downloader decides where they go.

use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use crate::model::{Album, Playlist, Song};

pub const ALBUM_NFO: &str = "album.nfo";
pub const COVER_STEM: &str = "cover";

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the NFO document for an album.
pub fn album_nfo(album: &Album, cover_file: Option<&str>) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<album>\n");
    let _ = writeln!(out, "  <title>{}</title>", escape_xml(&album.name));
    for artist in &album.artists {
        let _ = writeln!(out, "  <artist>{}</artist>", escape_xml(&artist.name));
    }
    if let Some(year) = album.year {
        let _ = writeln!(out, "  <year>{}</year>", year);
    }
    if let Some(id) = album.ids.get(crate::model::providers::MUSICBRAINZ) {
        let _ = writeln!(out, "  <musicbrainzalbumid>{}</musicbrainzalbumid>", escape_xml(id));
    }
    if let Some(cover) = cover_file {
        let _ = writeln!(out, "  <thumb>{}</thumb>", escape_xml(cover));
    }
    for (position, song) in album.songs.iter().enumerate() {
        out.push_str("  <track>\n");
        let _ = writeln!(out, "    <position>{}</position>", position + 1);
        let _ = writeln!(out, "    <title>{}</title>", escape_xml(&song.name));
        if let Some(duration) = song.duration.filter(|d| *d > 0.0) {
            let secs = duration.round() as u64;
            let _ = writeln!(out, "    <duration>{}:{:02}</duration>", secs / 60, secs % 60);
        }
        out.push_str("  </track>\n");
    }
    out.push_str("</album>\n");
    out
}

/// Render an extended M3U.
///
/// `entries` pairs each song with its path relative to the M3U file.
pub fn playlist_m3u(playlist: &Playlist, entries: &[(&Song, String)], cover_file: Option<&str>) -> String {
    let mut out = String::from("#EXTM3U\n");
    let _ = writeln!(out, "#PLAYLIST:{}", playlist.name);
    if let Some(cover) = cover_file {
        let _ = writeln!(out, "#EXTIMG:{}", cover);
    }
    for (song, path) in entries {
        let secs = song.duration.map(|d| d.round() as i64).unwrap_or(-1);
        let _ = writeln!(out, "#EXTINF:{},{}", secs, song);
        let _ = writeln!(out, "{}", path);
    }
    out
}

/// Entry of a parsed M3U file.
#[derive(Debug, Clone, PartialEq)]
pub struct M3uEntry {
    /// Path as written in the file, resolved against the M3U directory
    pub path: PathBuf,
    /// `#EXTINF` title, when present
    pub title: Option<String>,
    pub duration: Option<f64>,
}

/// Parsed M3U file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct M3u {
    pub name: Option<String>,
    pub cover: Option<PathBuf>,
    pub entries: Vec<M3uEntry>,
}

/// Parse M3U text. Relative paths are resolved against `base_dir`.
pub fn parse_m3u(text: &str, base_dir: &Path) -> M3u {
    let mut m3u = M3u::default();
    let mut pending: Option<(Option<f64>, Option<String>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(name) = line.strip_prefix("#PLAYLIST:") {
            m3u.name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        } else if let Some(cover) = line.strip_prefix("#EXTIMG:") {
            m3u.cover = Some(base_dir.join(cover.trim()));
        } else if let Some(info) = line.strip_prefix("#EXTINF:") {
            let (secs, title) = info.split_once(',').unwrap_or((info, ""));
            let duration = secs.trim().parse::<f64>().ok().filter(|d| *d > 0.0);
            let title = Some(title.trim().to_string()).filter(|t| !t.is_empty());
            pending = Some((duration, title));
        } else if line.starts_with('#') {
            continue;
        } else {
            let (duration, title) = pending.take().unwrap_or((None, None));
            m3u.entries.push(M3uEntry {
                path: base_dir.join(line),
                title,
                duration,
            });
        }
    }
    m3u
}

/// Path of `target` relative to the directory `from`.
///
/// Both paths must share a prefix; the result uses `/` separators so M3U
/// files stay portable.
pub fn relative_path(from: &Path, target: &Path) -> String {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), from.len() - common));
    parts.extend(to[common..].iter().map(|c| c.as_os_str().to_string_lossy().into_owned()));
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;
    use crate::model::Artist;

    fn album() -> Album {
        let matcher = Matcher::default();
        let mut album = Album::new("Rock & Roll").with_artist(Artist::new("Band")).with_year(1999);
        album
            .add_song(Song::new("Intro").with_duration(65.0), &matcher)
            .unwrap();
        album.add_song(Song::new("<Outro>"), &matcher).unwrap();
        album
    }

    #[test]
    fn test_album_nfo_contents() {
        let nfo = album_nfo(&album(), Some("cover.jpg"));

        assert!(nfo.contains("<title>Rock &amp; Roll</title>"));
        assert!(nfo.contains("<artist>Band</artist>"));
        assert!(nfo.contains("<year>1999</year>"));
        assert!(nfo.contains("<thumb>cover.jpg</thumb>"));
        assert!(nfo.contains("<duration>1:05</duration>"));
        assert!(nfo.contains("<title>&lt;Outro&gt;</title>"));
        assert!(nfo.contains("<position>2</position>"));
    }

    #[test]
    fn test_playlist_m3u_contents() {
        let playlist = Playlist::new("Road Trip");
        let song = Song::new("Hurt").with_artist(Artist::new("Johnny Cash")).with_duration(218.4);
        let unknown = Song::new("Mystery");
        let entries = vec![
            (&song, "../Hurt (Johnny Cash)/Hurt - Johnny Cash.mp3".to_string()),
            (&unknown, "Mystery.mp3".to_string()),
        ];

        let m3u = playlist_m3u(&playlist, &entries, Some("Road Trip.jpg"));
        let lines: Vec<&str> = m3u.lines().collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#PLAYLIST:Road Trip");
        assert_eq!(lines[2], "#EXTIMG:Road Trip.jpg");
        assert_eq!(lines[3], "#EXTINF:218,Hurt - Johnny Cash");
        assert_eq!(lines[4], "../Hurt (Johnny Cash)/Hurt - Johnny Cash.mp3");
        assert_eq!(lines[5], "#EXTINF:-1,Mystery");
    }

    #[test]
    fn test_parse_m3u() {
        let text = "#EXTM3U\n#PLAYLIST:Road Trip\n#EXTIMG:cover.png\n\
                    #EXTINF:218,Hurt - Johnny Cash\n../Album/Hurt.mp3\n\nplain.mp3\n";
        let m3u = parse_m3u(text, Path::new("/music/Road Trip"));

        assert_eq!(m3u.name.as_deref(), Some("Road Trip"));
        assert_eq!(m3u.cover, Some(PathBuf::from("/music/Road Trip/cover.png")));
        assert_eq!(m3u.entries.len(), 2);
        assert_eq!(m3u.entries[0].title.as_deref(), Some("Hurt - Johnny Cash"));
        assert_eq!(m3u.entries[0].duration, Some(218.0));
        assert_eq!(m3u.entries[1].title, None);
        assert_eq!(m3u.entries[1].path, PathBuf::from("/music/Road Trip/plain.mp3"));
    }

    #[test]
    fn test_parse_m3u_ignores_unknown_directives() {
        let m3u = parse_m3u("#EXTM3U\n#EXTGENRE:rock\nsong.mp3\n", Path::new("/m"));
        assert_eq!(m3u.entries.len(), 1);
        assert!(m3u.name.is_none());
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/music");
        assert_eq!(relative_path(root, &root.join("a.mp3")), "a.mp3");
        assert_eq!(relative_path(root, &root.join("Album").join("a.mp3")), "Album/a.mp3");
        assert_eq!(
            relative_path(&root.join("Playlist"), &root.join("Album").join("a.mp3")),
            "../Album/a.mp3"
        );
    }
}
