//! Stream handling
//!
//! Connects to ICY (Icecast/Shoutcast) servers, splits the body into audio
//! and metadata, and parses the song currently on air.

pub mod demux;
pub mod metadata;
pub mod source;

pub use demux::{DemuxEvent, DemuxState, IcyDemuxer};
pub use metadata::{parse_song, SongInfo};
pub use source::{IcyHeaders, IcySource};
