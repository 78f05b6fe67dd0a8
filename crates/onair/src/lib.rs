//! OnAir: ICY stream monitor
//!
//! Splits an Icecast/Shoutcast stream into audio and inline metadata,
//! tracks the currently playing song, and notifies subscribers.
//!
//! ## Quick start
//!
//! ```no_run
//! use onair::session::StreamSession;
//!
//! let mut session = StreamSession::new("http://example.com/stream");
//! session.on_song_changed(|_, event| {
//!     println!("now playing: {:?}", event.new);
//!     Ok(())
//! })?;
//! session.start()?;
//! // ...
//! session.dispose()?;
//! # Ok::<(), onair::error::RadioError>(())
//! ```

pub mod config;
pub mod error;
pub mod plugin;
pub mod session;
pub mod stream;
