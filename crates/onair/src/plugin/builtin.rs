//! Built-in plugins

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::info;

use crate::error::Result;
use crate::session::events::{SongChanged, StreamData};

use super::Plugin;

/// Logs every song change
#[derive(Debug, Default)]
pub struct SongLogPlugin {
    changes: u64,
}

impl SongLogPlugin {
    pub const NAME: &'static str = "song-log";

    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for SongLogPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_song_changed(&mut self, event: &SongChanged) -> Result<()> {
        self.changes += 1;
        match &event.new {
            Some(song) => info!(artist = %song.artist, title = %song.title, "now playing"),
            None => info!("no song information"),
        }
        Ok(())
    }

    fn dispose(&mut self) {
        info!(changes = self.changes, "song log closed");
    }
}

/// Counts audio bytes passed through the session
#[derive(Debug, Default)]
pub struct ByteCounterPlugin {
    bytes: Arc<AtomicU64>,
}

impl ByteCounterPlugin {
    pub const NAME: &'static str = "byte-counter";

    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter, readable from any thread while the stream runs
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.bytes.clone()
    }
}

impl Plugin for ByteCounterPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_stream_data(&mut self, event: &StreamData) -> Result<()> {
        self.bytes
            .fetch_add(event.bytes.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn dispose(&mut self) {
        info!(bytes = self.bytes.load(Ordering::Relaxed), "audio bytes received");
    }
}

/// Events forwarded by a [`ChannelPlugin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    SongChanged(SongChanged),
    StreamData(StreamData),
}

/// Forwards events to a channel so another thread can consume them.
///
/// A dropped receiver is not an error; events are then discarded.
pub struct ChannelPlugin {
    name: String,
    tx: Sender<PluginEvent>,
    forward_data: bool,
}

impl ChannelPlugin {
    /// Forward song changes and audio
    pub fn new(name: impl Into<String>) -> (Self, Receiver<PluginEvent>) {
        Self::build(name.into(), true)
    }

    /// Forward song changes only
    pub fn songs_only(name: impl Into<String>) -> (Self, Receiver<PluginEvent>) {
        Self::build(name.into(), false)
    }

    fn build(name: String, forward_data: bool) -> (Self, Receiver<PluginEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                name,
                tx,
                forward_data,
            },
            rx,
        )
    }
}

impl Plugin for ChannelPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_song_changed(&mut self, event: &SongChanged) -> Result<()> {
        let _ = self.tx.send(PluginEvent::SongChanged(event.clone()));
        Ok(())
    }

    fn on_stream_data(&mut self, event: &StreamData) -> Result<()> {
        if self.forward_data {
            let _ = self.tx.send(PluginEvent::StreamData(event.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::metadata::SongInfo;

    fn song_change() -> SongChanged {
        SongChanged {
            old: None,
            new: Some(SongInfo::new("A", "B")),
        }
    }

    #[test]
    fn song_log_counts_changes() {
        let mut plugin = SongLogPlugin::new();
        plugin.on_song_changed(&song_change()).unwrap();
        plugin
            .on_song_changed(&SongChanged {
                old: Some(SongInfo::new("A", "B")),
                new: None,
            })
            .unwrap();
        assert_eq!(plugin.changes, 2);
        plugin.dispose();
    }

    #[test]
    fn byte_counter_accumulates() {
        let mut plugin = ByteCounterPlugin::new();
        let counter = plugin.counter();
        plugin.on_stream_data(&StreamData { bytes: vec![0; 10] }).unwrap();
        plugin.on_stream_data(&StreamData { bytes: vec![0; 5] }).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 15);
    }

    #[test]
    fn channel_forwards_everything() {
        let (mut plugin, rx) = ChannelPlugin::new("tap");
        plugin.on_song_changed(&song_change()).unwrap();
        plugin.on_stream_data(&StreamData { bytes: vec![9] }).unwrap();

        assert_eq!(rx.recv().unwrap(), PluginEvent::SongChanged(song_change()));
        assert_eq!(
            rx.recv().unwrap(),
            PluginEvent::StreamData(StreamData { bytes: vec![9] })
        );
        assert_eq!(plugin.name(), "tap");
    }

    #[test]
    fn channel_songs_only_skips_audio() {
        let (mut plugin, rx) = ChannelPlugin::songs_only("songs");
        plugin.on_stream_data(&StreamData { bytes: vec![9] }).unwrap();
        plugin.on_song_changed(&song_change()).unwrap();

        assert_eq!(rx.try_recv().unwrap(), PluginEvent::SongChanged(song_change()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_with_dropped_receiver_is_not_an_error() {
        let (mut plugin, rx) = ChannelPlugin::new("gone");
        drop(rx);
        assert!(plugin.on_song_changed(&song_change()).is_ok());
    }
}
