//! Plugins
//!
//! Extensions that want song changes and the raw audio implement [`Plugin`]
//! and are kept, in registration order, by a [`PluginManager`]. Plugins are
//! statically linked; a plugin directory only selects which built-ins to
//! enable through its `plugins.json` manifest.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::plugins::MANIFEST_FILE;
use crate::error::{RadioError, Result};
use crate::session::events::{SongChanged, StreamData};

pub mod builtin;

pub use builtin::{ByteCounterPlugin, ChannelPlugin, PluginEvent, SongLogPlugin};

/// An extension receiving session events
///
/// Every handler defaults to a no-op. An error returned from a handler halts
/// the stream.
pub trait Plugin: Send {
    /// Display name (e.g., "song-log")
    fn name(&self) -> &str;

    fn on_song_changed(&mut self, _event: &SongChanged) -> Result<()> {
        Ok(())
    }

    fn on_stream_data(&mut self, _event: &StreamData) -> Result<()> {
        Ok(())
    }

    /// Release held resources. Called once by `dispose_extensions`.
    fn dispose(&mut self) {}
}

/// Contents of a plugin directory's manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

/// One manifest line
#[derive(Debug, Clone, Deserialize)]
pub struct PluginEntry {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl PluginManifest {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Instantiate a statically linked plugin by name
pub fn create_builtin(name: &str) -> Option<Box<dyn Plugin>> {
    match name {
        SongLogPlugin::NAME => Some(Box::new(SongLogPlugin::new())),
        ByteCounterPlugin::NAME => Some(Box::new(ByteCounterPlugin::new())),
        _ => None,
    }
}

/// Ordered registry of loaded plugins
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    /// Load the plugins enabled in `dir/plugins.json`.
    ///
    /// A missing directory or manifest loads nothing. Unknown plugin names
    /// are an error and leave the registry untouched. Returns the names of
    /// the plugins added.
    pub fn load_extensions(&mut self, dir: &Path) -> Result<Vec<String>> {
        let path = dir.join(MANIFEST_FILE);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no plugin manifest");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let manifest = PluginManifest::parse(&json)?;
        let mut loaded = Vec::new();
        for entry in manifest.plugins.iter().filter(|e| e.enabled) {
            let plugin = create_builtin(&entry.name)
                .ok_or_else(|| RadioError::Plugin(format!("unknown plugin {:?}", entry.name)))?;
            loaded.push(plugin);
        }

        let names: Vec<String> = loaded.iter().map(|p| p.name().to_string()).collect();
        for plugin in loaded {
            self.register(plugin);
        }
        Ok(names)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn on_song_changed(&mut self, event: &SongChanged) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_song_changed(event)?;
        }
        Ok(())
    }

    pub fn on_stream_data(&mut self, event: &StreamData) -> Result<()> {
        for plugin in &mut self.plugins {
            plugin.on_stream_data(event)?;
        }
        Ok(())
    }

    /// Dispose every plugin in registration order and empty the registry
    pub fn dispose_extensions(&mut self) {
        for mut plugin in self.plugins.drain(..) {
            debug!(plugin = plugin.name(), "disposing plugin");
            plugin.dispose();
        }
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if !self.plugins.is_empty() {
            warn!(count = self.plugins.len(), "plugins dropped without dispose");
        }
    }
}
