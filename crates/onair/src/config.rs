//! Configuration constants for the stream session

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("OnAir/", env!("CARGO_PKG_VERSION"));

    /// Header asking the server to interleave metadata into the body
    pub const ICY_METADATA_HEADER: &str = "Icy-MetaData";

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Idle read timeout in seconds. A stalled source ends the session
    /// with an I/O error after this long without a single byte.
    pub const READ_TIMEOUT_SECS: u64 = 30;
}

/// Stream worker configuration
pub mod stream {
    /// Size of the buffer handed to each blocking read (bytes)
    pub const READ_BUFFER_SIZE: usize = 16 * 1024;

    /// Name of the worker thread
    pub const WORKER_THREAD_NAME: &str = "onair-stream";
}

/// ICY wire format
pub mod icy {
    /// A metadata length byte counts blocks of this many bytes
    pub const METADATA_BLOCK_UNIT: usize = 16;

    /// Largest metadata block a single length byte can announce
    pub const MAX_METADATA_LEN: usize = 255 * METADATA_BLOCK_UNIT;
}

/// Plugin loading configuration
pub mod plugins {
    /// Manifest file looked up inside a plugin directory
    pub const MANIFEST_FILE: &str = "plugins.json";

    /// Plugin directory used when the caller does not name one
    pub const DEFAULT_DIR: &str = "plugins";
}
