//! Ordered event dispatch
//!
//! `Notifier` keeps one ordered handler list per event kind and the plugin
//! registry. Dispatch is synchronous on the caller's thread: a slow handler
//! slows the stream down.
//!
//! Changes follow a notify-then-commit order. Handlers see the stored value
//! in `NowPlaying` as it was *before* the change; the new value is committed
//! only after every handler has returned.

use crate::error::Result;
use crate::plugin::PluginManager;
use crate::stream::metadata::{parse_song, SongInfo};

use super::events::{MetadataChanged, SongChanged, StreamData};

/// Values the session currently holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    metadata: Option<String>,
    song: Option<SongInfo>,
}

impl NowPlaying {
    /// Last committed metadata text
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Last committed song, `None` for "no song"
    pub fn song(&self) -> Option<&SongInfo> {
        self.song.as_ref()
    }

    pub(crate) fn commit_metadata(&mut self, metadata: String) {
        self.metadata = Some(metadata);
    }

    pub(crate) fn commit_song(&mut self, song: Option<SongInfo>) {
        self.song = song;
    }
}

type Handler<E> = Box<dyn FnMut(&NowPlaying, &E) -> Result<()> + Send>;

/// Synchronous multicast dispatcher for session events
#[derive(Default)]
pub struct Notifier {
    metadata_handlers: Vec<Handler<MetadataChanged>>,
    song_handlers: Vec<Handler<SongChanged>>,
    data_handlers: Vec<Handler<StreamData>>,
    plugins: PluginManager,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_metadata_changed<F>(&mut self, handler: F)
    where
        F: FnMut(&NowPlaying, &MetadataChanged) -> Result<()> + Send + 'static,
    {
        self.metadata_handlers.push(Box::new(handler));
    }

    pub fn on_song_changed<F>(&mut self, handler: F)
    where
        F: FnMut(&NowPlaying, &SongChanged) -> Result<()> + Send + 'static,
    {
        self.song_handlers.push(Box::new(handler));
    }

    pub fn on_stream_data<F>(&mut self, handler: F)
    where
        F: FnMut(&NowPlaying, &StreamData) -> Result<()> + Send + 'static,
    {
        self.data_handlers.push(Box::new(handler));
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginManager {
        &mut self.plugins
    }

    pub fn notify_metadata_changed(
        &mut self,
        now: &NowPlaying,
        event: &MetadataChanged,
    ) -> Result<()> {
        for handler in &mut self.metadata_handlers {
            handler(now, event)?;
        }
        Ok(())
    }

    /// Handlers first, then plugins, each in registration order
    pub fn notify_song_changed(&mut self, now: &NowPlaying, event: &SongChanged) -> Result<()> {
        for handler in &mut self.song_handlers {
            handler(now, event)?;
        }
        self.plugins.on_song_changed(event)
    }

    pub fn notify_stream_data(&mut self, now: &NowPlaying, event: &StreamData) -> Result<()> {
        for handler in &mut self.data_handlers {
            handler(now, event)?;
        }
        self.plugins.on_stream_data(event)
    }

    /// Apply a freshly received metadata block.
    ///
    /// Identical text is ignored. Otherwise MetadataChanged is raised, the
    /// song is derived from the new text (raising SongChanged and committing
    /// it when it differs), and finally the text itself is committed.
    pub fn apply_metadata(&mut self, now: &mut NowPlaying, text: String) -> Result<()> {
        if now.metadata() == Some(text.as_str()) {
            return Ok(());
        }

        let event = MetadataChanged {
            old: now.metadata.clone(),
            new: text,
        };
        self.notify_metadata_changed(now, &event)?;

        let song = parse_song(&event.new);
        if song.as_ref() != now.song() {
            let change = SongChanged {
                old: now.song.clone(),
                new: song,
            };
            self.notify_song_changed(now, &change)?;
            now.commit_song(change.new);
        }

        now.commit_metadata(event.new);
        Ok(())
    }

    /// Pass one audio chunk to subscribers
    pub fn apply_audio(&mut self, now: &NowPlaying, bytes: Vec<u8>) -> Result<()> {
        self.notify_stream_data(now, &StreamData { bytes })
    }
}
