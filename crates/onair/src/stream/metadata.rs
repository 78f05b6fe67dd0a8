//! Song metadata parsing
//!
//! Pure functions over ICY metadata text: decoding raw blocks, pulling out
//! the `StreamTitle` value and splitting it into artist and title.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Greedy artist, lazy title: with several ` - ` separators the artist keeps
/// everything up to the last one.
static SONG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"StreamTitle='(?P<artist>.+) - (?P<title>.+?)';")
        .expect("song pattern is a valid regex")
});

const STREAM_TITLE_PREFIX: &str = "StreamTitle='";
const STREAM_TITLE_END: &str = "';";

/// Artist and title of the song currently on air
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongInfo {
    pub artist: String,
    pub title: String,
}

impl SongInfo {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for SongInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Parse a metadata text block into the song on air.
///
/// Matches `StreamTitle='<artist> - <title>';` after trimming the NUL padding
/// that fills blocks up to 16-byte granularity. Anything that does not match
/// yields `None` ("no current song").
pub fn parse_song(text: &str) -> Option<SongInfo> {
    let text = text.trim_end_matches('\0');
    let caps = SONG_PATTERN.captures(text)?;
    Some(SongInfo::new(&caps["artist"], &caps["title"]))
}

/// Extract the raw `StreamTitle` value from a metadata text block.
///
/// ICY metadata format: `StreamTitle='Artist - Song';StreamUrl='...';`
pub fn stream_title(text: &str) -> Option<String> {
    let start = text.find(STREAM_TITLE_PREFIX)? + STREAM_TITLE_PREFIX.len();
    let end = text[start..].find(STREAM_TITLE_END)?;
    let title = text[start..start + end].trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Decode a raw metadata block into text.
///
/// Trailing NUL padding is stripped. Valid UTF-8 is taken as is; anything
/// else is read as Latin-1 so every byte maps to exactly one char.
pub fn decode_metadata_block(raw_block: &[u8]) -> String {
    let end = raw_block
        .iter()
        .rposition(|&b| b != 0)
        .map(|p| p + 1)
        .unwrap_or(0);
    let bytes = &raw_block[..end];

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
