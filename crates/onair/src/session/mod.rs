//! Stream session
//!
//! `StreamSession` owns one worker thread that reads from the source, feeds
//! the demuxer and dispatches events. All mutable stream state (demuxer
//! counters, current metadata and song) lives on that thread; the only value
//! shared with the controlling thread is the running flag.
//!
//! Cancellation is cooperative: the flag is checked once per network read, so
//! `stop()` returns after the in-flight read completes. Once `stop()` returns
//! no further event fires.

use std::any::Any;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::config::stream::{READ_BUFFER_SIZE, WORKER_THREAD_NAME};
use crate::error::{RadioError, Result};
use crate::plugin::{Plugin, PluginManager};
use crate::stream::demux::{DemuxEvent, IcyDemuxer};
use crate::stream::source::{IcyHeaders, IcySource};

pub mod events;
pub mod notifier;

pub use events::{MetadataChanged, SongChanged, StreamData};
pub use notifier::{Notifier, NowPlaying};

/// How a worker that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was called
    Stopped,
    /// The server closed the stream
    EndOfStream,
}

/// What the worker hands back when it exits
struct WorkerExit {
    notifier: Notifier,
    now_playing: NowPlaying,
    result: Result<SessionEnd>,
}

/// A monitored ICY stream
pub struct StreamSession {
    url: String,
    running: Arc<AtomicBool>,
    /// `None` while a worker owns it
    notifier: Option<Notifier>,
    now_playing: NowPlaying,
    headers: Option<IcyHeaders>,
    worker: Option<JoinHandle<WorkerExit>>,
}

impl StreamSession {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            running: Arc::new(AtomicBool::new(false)),
            notifier: Some(Notifier::new()),
            now_playing: NowPlaying::default(),
            headers: None,
            worker: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Headers of the current (or last) connection
    pub fn headers(&self) -> Option<&IcyHeaders> {
        self.headers.as_ref()
    }

    /// Metadata and song as of the last time the worker was joined
    pub fn now_playing(&self) -> &NowPlaying {
        &self.now_playing
    }

    pub fn on_metadata_changed<F>(&mut self, handler: F) -> Result<()>
    where
        F: FnMut(&NowPlaying, &MetadataChanged) -> Result<()> + Send + 'static,
    {
        self.idle_notifier()?.on_metadata_changed(handler);
        Ok(())
    }

    pub fn on_song_changed<F>(&mut self, handler: F) -> Result<()>
    where
        F: FnMut(&NowPlaying, &SongChanged) -> Result<()> + Send + 'static,
    {
        self.idle_notifier()?.on_song_changed(handler);
        Ok(())
    }

    pub fn on_stream_data<F>(&mut self, handler: F) -> Result<()>
    where
        F: FnMut(&NowPlaying, &StreamData) -> Result<()> + Send + 'static,
    {
        self.idle_notifier()?.on_stream_data(handler);
        Ok(())
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<()> {
        self.idle_notifier()?.plugins_mut().register(plugin);
        Ok(())
    }

    /// Load the plugins enabled in `dir`'s manifest; returns their names
    pub fn load_extensions(&mut self, dir: &Path) -> Result<Vec<String>> {
        self.idle_notifier()?.plugins_mut().load_extensions(dir)
    }

    pub fn plugins(&self) -> Option<&PluginManager> {
        self.notifier.as_ref().map(Notifier::plugins)
    }

    /// Connect to the session URL and start the worker.
    ///
    /// Connection and protocol errors are returned here; the session then
    /// stays idle.
    pub fn start(&mut self) -> Result<()> {
        self.idle_notifier()?;
        let source = IcySource::connect(&self.url)?;
        self.start_with_source(source)
    }

    /// Start the worker on an already-open source
    pub fn start_with_source(&mut self, source: IcySource) -> Result<()> {
        self.idle_notifier()?;
        let notifier = self
            .notifier
            .take()
            .ok_or_else(|| RadioError::Stream("session handlers unavailable".to_string()))?;

        self.headers = Some(source.headers.clone());
        self.now_playing = NowPlaying::default();
        self.running.store(true, Ordering::SeqCst);

        let worker = Worker {
            demuxer: IcyDemuxer::new(source.metaint()),
            source,
            notifier,
            now_playing: NowPlaying::default(),
            running: self.running.clone(),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                RadioError::Worker(format!("Failed to spawn stream thread: {}", e))
            })?;

        debug!(url = %self.url, "stream session started");
        self.worker = Some(handle);
        Ok(())
    }

    /// Ask the worker to stop and wait for it to exit.
    ///
    /// Returns how the worker ended, `None` if there was no worker, or the
    /// failure that terminated it.
    pub fn stop(&mut self) -> Result<Option<SessionEnd>> {
        self.running.store(false, Ordering::SeqCst);
        self.join()
    }

    /// Wait for the worker to finish on its own (end of stream or failure)
    pub fn wait(&mut self) -> Result<Option<SessionEnd>> {
        self.join()
    }

    /// Stop the session and release its plugins
    pub fn dispose(mut self) -> Result<Option<SessionEnd>> {
        self.dispose_inner()
    }

    fn dispose_inner(&mut self) -> Result<Option<SessionEnd>> {
        let result = self.stop();
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.plugins_mut().dispose_extensions();
        }
        result
    }

    fn join(&mut self) -> Result<Option<SessionEnd>> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };

        let exit = handle
            .join()
            .map_err(|_| RadioError::Worker("stream thread panicked".to_string()))?;
        self.notifier = Some(exit.notifier);
        self.now_playing = exit.now_playing;
        exit.result.map(Some)
    }

    fn idle_notifier(&mut self) -> Result<&mut Notifier> {
        if self.worker.is_some() {
            return Err(RadioError::Stream("session already running".to_string()));
        }
        self.notifier
            .as_mut()
            .ok_or_else(|| RadioError::Stream("session handlers unavailable".to_string()))
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Err(e) = self.dispose_inner() {
            warn!(error = %e, "stream session ended with error");
        }
    }
}

/// Clears the running flag however the worker exits, panics included
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// State owned by the worker thread
struct Worker {
    source: IcySource,
    demuxer: IcyDemuxer,
    notifier: Notifier,
    now_playing: NowPlaying,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) -> WorkerExit {
        let _guard = RunningGuard(self.running.clone());

        // A panicking subscriber still hands the handlers back to the session
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pump())).unwrap_or_else(
            |payload| {
                Err(RadioError::Worker(format!(
                    "stream thread panicked: {}",
                    panic_message(payload.as_ref())
                )))
            },
        );
        match &result {
            Ok(end) => debug!(
                ?end,
                bytes = self.source.bytes_received(),
                "stream worker finished"
            ),
            Err(e) => warn!(error = %e, "stream worker failed"),
        }

        // The source, and with it the connection, is dropped here
        let Worker {
            notifier,
            now_playing,
            ..
        } = self;
        WorkerExit {
            notifier,
            now_playing,
            result,
        }
    }

    fn pump(&mut self) -> Result<SessionEnd> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        while self.running.load(Ordering::SeqCst) {
            let n = self.source.read(&mut buf)?;
            if n == 0 {
                return Ok(SessionEnd::EndOfStream);
            }

            for event in self.demuxer.feed(&buf[..n]) {
                match event {
                    DemuxEvent::Audio(bytes) => {
                        self.notifier.apply_audio(&self.now_playing, bytes)?
                    }
                    DemuxEvent::Metadata(text) => {
                        self.notifier.apply_metadata(&mut self.now_playing, text)?
                    }
                }
            }
        }

        Ok(SessionEnd::Stopped)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown cause"
    }
}
