//! ICY network source
//!
//! Opens the HTTP connection with metadata negotiation enabled, reads the
//! `icy-metaint` interval from the response headers and exposes the body as
//! a blocking byte reader.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::config::network::{
    CONNECT_TIMEOUT_SECS, ICY_METADATA_HEADER, READ_TIMEOUT_SECS, USER_AGENT,
};
use crate::error::{RadioError, Result};

/// Headers parsed from an ICY stream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcyHeaders {
    /// Audio bytes between two metadata blocks
    pub metaint: usize,
    pub station_name: Option<String>,
    pub genre: Option<String>,
    pub content_type: Option<String>,
    /// Nominal bitrate in kbps
    pub bitrate: Option<u32>,
}

impl IcyHeaders {
    /// Headers carrying only the metadata interval
    pub fn with_metaint(metaint: usize) -> Self {
        Self {
            metaint,
            station_name: None,
            genre: None,
            content_type: None,
            bitrate: None,
        }
    }

    /// Read ICY headers from an HTTP response.
    ///
    /// `icy-metaint` is mandatory; the informational headers are optional.
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self> {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let metaint = parse_metaint(text("icy-metaint").as_deref())?;

        Ok(Self {
            metaint,
            station_name: text("icy-name"),
            genre: text("icy-genre"),
            content_type: text("content-type"),
            bitrate: text("icy-br").and_then(|v| v.parse::<u32>().ok()),
        })
    }
}

/// Parse the `icy-metaint` header value.
///
/// Absent, non-numeric or zero values are protocol errors: without a positive
/// interval the body cannot be split.
pub fn parse_metaint(value: Option<&str>) -> Result<usize> {
    let value = value
        .ok_or_else(|| RadioError::Protocol("missing icy-metaint header".to_string()))?;
    let metaint = value
        .trim()
        .parse::<usize>()
        .map_err(|_| RadioError::Protocol(format!("invalid icy-metaint value {value:?}")))?;
    if metaint == 0 {
        return Err(RadioError::Protocol("icy-metaint must be positive".to_string()));
    }
    Ok(metaint)
}

/// Blocking ICY byte source.
///
/// Dropping the source closes the underlying connection.
pub struct IcySource {
    pub headers: IcyHeaders,
    reader: Box<dyn Read + Send>,
    bytes_received: u64,
}

impl IcySource {
    /// Connect to `url` asking for inline metadata.
    ///
    /// Fails on transport errors, non-success status, or a missing/invalid
    /// `icy-metaint` header.
    pub fn connect(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()?;

        debug!(url, "connecting");
        let response = client.get(url).header(ICY_METADATA_HEADER, "1").send()?;

        if !response.status().is_success() {
            return Err(RadioError::Stream(format!("HTTP {}", response.status())));
        }

        let headers = IcyHeaders::from_header_map(response.headers())?;
        debug!(
            metaint = headers.metaint,
            station = headers.station_name.as_deref().unwrap_or("-"),
            "connected"
        );

        Ok(Self::from_reader(headers, response))
    }

    /// Wrap an already-open byte stream
    pub fn from_reader(headers: IcyHeaders, reader: impl Read + Send + 'static) -> Self {
        Self {
            headers,
            reader: Box::new(reader),
            bytes_received: 0,
        }
    }

    pub fn metaint(&self) -> usize {
        self.headers.metaint
    }

    /// Total bytes read from the network so far, metadata included
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

impl Read for IcySource {
    /// Blocking read; `Ok(0)` means the server closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.reader.read(buf) {
                Ok(n) => {
                    self.bytes_received += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl fmt::Debug for IcySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IcySource")
            .field("headers", &self.headers)
            .field("bytes_received", &self.bytes_received)
            .finish_non_exhaustive()
    }
}
