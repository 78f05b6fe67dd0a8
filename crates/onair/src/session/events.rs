//! Event records
//!
//! Owned snapshots handed to subscribers. Building one never borrows the
//! session's mutable state.

use crate::stream::metadata::SongInfo;

/// The metadata text changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChanged {
    /// Text before the change; `None` until the first block arrives
    pub old: Option<String>,
    pub new: String,
}

/// The song on air changed. `None` means "no song".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongChanged {
    pub old: Option<SongInfo>,
    pub new: Option<SongInfo>,
}

/// A chunk of audio passed through from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamData {
    pub bytes: Vec<u8>,
}
