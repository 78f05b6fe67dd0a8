//! ICY demultiplexer
//!
//! Splits the raw ICY body into audio and metadata. Every `metaint` audio
//! bytes the server inserts one length byte (`len * 16` bytes follow) and,
//! when the length is non-zero, a metadata text block.
//!
//! The demuxer keeps its position across `feed` calls, so the caller may hand
//! it whatever a network read returned: a block, or even its length byte,
//! can straddle two calls.

use tracing::trace;

use crate::config::icy::METADATA_BLOCK_UNIT;
use crate::stream::metadata::decode_metadata_block;

/// Where the demuxer is within the current metadata interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemuxState {
    /// Passing audio through until `metaint` bytes have been seen
    #[default]
    AwaitingAudio,
    /// Next byte is the metadata length
    ReadingLength,
    /// Collecting the announced number of metadata bytes
    ReadingMetadata,
}

/// Output of a single `feed` call, in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    /// Owned copy of a contiguous span of audio
    Audio(Vec<u8>),
    /// Text of one metadata block, NUL padding removed
    Metadata(String),
}

/// Stateful splitter for an ICY byte stream
#[derive(Debug)]
pub struct IcyDemuxer {
    metaint: usize,
    state: DemuxState,
    /// Audio bytes since the last boundary, always within `0..=metaint`
    audio_consumed: usize,
    metadata_remaining: usize,
    metadata_buf: Vec<u8>,
}

impl IcyDemuxer {
    /// Create a demuxer for the given metadata interval.
    ///
    /// # Panics
    ///
    /// Panics if `metaint` is zero; `parse_metaint` never produces one.
    pub fn new(metaint: usize) -> Self {
        assert!(metaint > 0, "metaint must be positive");
        Self {
            metaint,
            state: DemuxState::AwaitingAudio,
            audio_consumed: 0,
            metadata_remaining: 0,
            metadata_buf: Vec::new(),
        }
    }

    pub fn metaint(&self) -> usize {
        self.metaint
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Consume the next span of the stream.
    ///
    /// Returns the audio chunks and metadata blocks found in `input`, in
    /// order. Input is copied; nothing borrowed from it is retained.
    pub fn feed(&mut self, input: &[u8]) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < input.len() {
            let rest = &input[pos..];
            match self.state {
                DemuxState::AwaitingAudio => {
                    let take = (self.metaint - self.audio_consumed).min(rest.len());
                    events.push(DemuxEvent::Audio(rest[..take].to_vec()));
                    self.audio_consumed += take;
                    pos += take;
                    if self.audio_consumed == self.metaint {
                        self.state = DemuxState::ReadingLength;
                    }
                }
                DemuxState::ReadingLength => {
                    let len = rest[0] as usize * METADATA_BLOCK_UNIT;
                    pos += 1;
                    self.audio_consumed = 0;
                    if len == 0 {
                        self.state = DemuxState::AwaitingAudio;
                    } else {
                        trace!(len, "metadata block announced");
                        self.metadata_remaining = len;
                        self.metadata_buf.reserve(len);
                        self.state = DemuxState::ReadingMetadata;
                    }
                }
                DemuxState::ReadingMetadata => {
                    let take = self.metadata_remaining.min(rest.len());
                    self.metadata_buf.extend_from_slice(&rest[..take]);
                    self.metadata_remaining -= take;
                    pos += take;
                    if self.metadata_remaining == 0 {
                        let text = decode_metadata_block(&self.metadata_buf);
                        trace!(%text, "metadata block complete");
                        events.push(DemuxEvent::Metadata(text));
                        self.metadata_buf.clear();
                        self.state = DemuxState::AwaitingAudio;
                    }
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::icy::MAX_METADATA_LEN;

    /// Build a metadata region: length byte followed by NUL-padded text
    fn meta_block(text: &str) -> Vec<u8> {
        let blocks = text.len().div_ceil(METADATA_BLOCK_UNIT);
        let mut out = vec![blocks as u8];
        out.extend_from_slice(text.as_bytes());
        out.resize(1 + blocks * METADATA_BLOCK_UNIT, 0);
        out
    }

    /// Concatenate all audio chunks
    fn audio_of(events: &[DemuxEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                DemuxEvent::Audio(bytes) => Some(bytes.as_slice()),
                DemuxEvent::Metadata(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    fn metadata_of(events: &[DemuxEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                DemuxEvent::Metadata(text) => Some(text.clone()),
                DemuxEvent::Audio(_) => None,
            })
            .collect()
    }

    /// Three intervals of audio with metadata of varying length (incl. 0)
    fn sample_stream(metaint: usize) -> (Vec<u8>, Vec<u8>) {
        let audio: Vec<u8> = (0..metaint * 3 + 5).map(|i| (i % 251) as u8).collect();
        let mut wire = Vec::new();
        wire.extend_from_slice(&audio[..metaint]);
        wire.extend(meta_block("StreamTitle='A - B';"));
        wire.extend_from_slice(&audio[metaint..metaint * 2]);
        wire.push(0);
        wire.extend_from_slice(&audio[metaint * 2..metaint * 3]);
        wire.extend(meta_block(
            "StreamTitle='Somebody With A Long Name - Song';StreamUrl='';",
        ));
        wire.extend_from_slice(&audio[metaint * 3..]);
        (wire, audio)
    }

    #[test]
    fn worked_example() {
        let mut wire = vec![0xAA; 8];
        wire.extend(meta_block("StreamTitle='X - Y';"));
        wire.extend(vec![0xBB; 8]);
        // 20 chars of text need two 16-byte units
        assert_eq!(wire[8], 2);

        let mut demux = IcyDemuxer::new(8);
        let events = demux.feed(&wire);
        assert_eq!(
            events,
            vec![
                DemuxEvent::Audio(vec![0xAA; 8]),
                DemuxEvent::Metadata("StreamTitle='X - Y';".to_string()),
                DemuxEvent::Audio(vec![0xBB; 8]),
            ]
        );
    }

    #[test]
    fn states_follow_the_interval() {
        let mut demux = IcyDemuxer::new(4);
        assert_eq!(demux.metaint(), 4);
        assert_eq!(demux.state(), DemuxState::AwaitingAudio);

        demux.feed(&[0; 4]);
        assert_eq!(demux.state(), DemuxState::ReadingLength);
        demux.feed(&[1]);
        assert_eq!(demux.state(), DemuxState::ReadingMetadata);
        demux.feed(&[0; 16]);
        assert_eq!(demux.state(), DemuxState::AwaitingAudio);
        assert_eq!(demux.metaint(), 4);
    }

    #[test]
    fn single_unit_block_with_padding() {
        let mut wire = vec![1u8; 8];
        wire.push(1);
        let mut text = b"StreamTitle='';".to_vec();
        text.resize(16, 0);
        wire.extend(text);
        wire.extend(vec![2u8; 8]);

        let mut demux = IcyDemuxer::new(8);
        let events = demux.feed(&wire);
        assert_eq!(metadata_of(&events), vec!["StreamTitle='';".to_string()]);
        assert_eq!(audio_of(&events), [vec![1u8; 8], vec![2u8; 8]].concat());
    }

    #[test]
    fn zero_length_byte_emits_no_metadata() {
        let mut wire = vec![7u8; 4];
        wire.push(0);
        wire.extend(vec![8u8; 4]);
        wire.push(0);
        wire.extend(vec![9u8; 2]);

        let mut demux = IcyDemuxer::new(4);
        let events = demux.feed(&wire);
        assert!(metadata_of(&events).is_empty());
        assert_eq!(audio_of(&events).len(), 10);
        assert_eq!(demux.state(), DemuxState::AwaitingAudio);
    }

    #[test]
    fn chunking_invariance_for_every_split_size() {
        let metaint = 16;
        let (wire, audio) = sample_stream(metaint);

        for size in 1..=wire.len() {
            let mut demux = IcyDemuxer::new(metaint);
            let events: Vec<DemuxEvent> =
                wire.chunks(size).flat_map(|c| demux.feed(c)).collect();
            assert_eq!(audio_of(&events), audio, "split size {size}");
            assert_eq!(
                metadata_of(&events),
                vec![
                    "StreamTitle='A - B';".to_string(),
                    "StreamTitle='Somebody With A Long Name - Song';StreamUrl='';".to_string(),
                ],
                "split size {size}"
            );
        }
    }

    #[test]
    fn length_byte_alone_in_a_call() {
        let mut demux = IcyDemuxer::new(4);
        assert_eq!(
            demux.feed(&[1, 2, 3, 4]),
            vec![DemuxEvent::Audio(vec![1, 2, 3, 4])]
        );
        assert_eq!(demux.state(), DemuxState::ReadingLength);

        assert!(demux.feed(&[1]).is_empty());
        assert_eq!(demux.state(), DemuxState::ReadingMetadata);

        let mut text = b"StreamTitle='Q - R';"[..16].to_vec();
        assert!(demux.feed(&text[..5]).is_empty());
        let events = demux.feed(&text.split_off(5));
        assert_eq!(events.len(), 1);
        assert_eq!(demux.state(), DemuxState::AwaitingAudio);
    }

    #[test]
    fn audio_between_boundaries_is_exactly_metaint() {
        let metaint = 10;
        let mut wire = Vec::new();
        for round in 0..5u8 {
            wire.extend(vec![round; metaint]);
            if round % 2 == 0 {
                wire.push(0);
            } else {
                wire.extend(meta_block("StreamTitle='A - B';"));
            }
        }

        let mut demux = IcyDemuxer::new(metaint);
        let mut since_boundary = 0;
        // One byte per call so every boundary is observable from outside
        for chunk in wire.chunks(1) {
            for event in demux.feed(chunk) {
                if let DemuxEvent::Audio(bytes) = event {
                    since_boundary += bytes.len();
                    assert!(since_boundary <= metaint);
                }
            }
            if demux.state() == DemuxState::ReadingLength {
                assert_eq!(since_boundary, metaint);
                since_boundary = 0;
            }
        }
        assert_eq!(since_boundary, 0);
    }

    #[test]
    fn several_blocks_in_one_call_keep_order() {
        let mut wire = Vec::new();
        wire.extend([1, 1]);
        wire.extend(meta_block("StreamTitle='First - One';"));
        wire.extend([2, 2]);
        wire.extend(meta_block("StreamTitle='Second - Two';"));
        wire.extend([3]);

        let mut demux = IcyDemuxer::new(2);
        let events = demux.feed(&wire);
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], DemuxEvent::Audio(vec![1, 1]));
        assert!(matches!(&events[1], DemuxEvent::Metadata(t) if t.contains("First")));
        assert_eq!(events[2], DemuxEvent::Audio(vec![2, 2]));
        assert!(matches!(&events[3], DemuxEvent::Metadata(t) if t.contains("Second")));
        assert_eq!(events[4], DemuxEvent::Audio(vec![3]));
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut demux = IcyDemuxer::new(8);
        assert!(demux.feed(&[]).is_empty());
        assert_eq!(demux.state(), DemuxState::AwaitingAudio);
    }

    #[test]
    fn audio_is_copied_not_borrowed() {
        let mut demux = IcyDemuxer::new(8);
        let mut buf = vec![5u8; 4];
        let events = demux.feed(&buf);
        buf.fill(0);
        assert_eq!(events, vec![DemuxEvent::Audio(vec![5u8; 4])]);
    }

    #[test]
    fn all_null_block_yields_empty_text() {
        let mut wire = vec![0u8; 2];
        wire.push(1);
        wire.extend([0u8; 16]);

        let mut demux = IcyDemuxer::new(2);
        let events = demux.feed(&wire);
        assert_eq!(metadata_of(&events), vec![String::new()]);
    }

    #[test]
    fn maximum_block_length() {
        let text = "x".repeat(MAX_METADATA_LEN);
        let mut wire = vec![0u8; 3];
        wire.push(255);
        wire.extend(text.as_bytes());

        let mut demux = IcyDemuxer::new(3);
        let events = demux.feed(&wire);
        assert_eq!(metadata_of(&events), vec![text]);
    }

    #[test]
    #[should_panic(expected = "metaint must be positive")]
    fn zero_metaint_panics() {
        let _ = IcyDemuxer::new(0);
    }
}
