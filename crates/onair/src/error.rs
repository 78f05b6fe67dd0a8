//! Error types for OnAir
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for the stream session
#[derive(Error, Debug)]
pub enum RadioError {
    #[error("{}", friendly_network_error(.0))]
    Network(#[from] reqwest::Error),

    /// The server answered but did not speak ICY the way we need
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Invalid plugin manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// A subscriber returned an error and halted the stream
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

/// Result type alias for OnAir
pub type Result<T> = std::result::Result<T, RadioError>;

fn friendly_network_error(e: &reqwest::Error) -> String {
    if e.is_builder() {
        if let Some(url) = e.url() {
            return format!("Invalid URL: {url}");
        }
        return "Invalid URL".to_string();
    }
    if e.is_connect() {
        if let Some(url) = e.url() {
            return format!("Could not connect to {}", url.host_str().unwrap_or("server"));
        }
        return "Could not connect to server".to_string();
    }
    if e.is_timeout() {
        return "Connection timed out".to_string();
    }
    format!("Network error: {e}")
}
