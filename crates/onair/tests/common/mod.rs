//! Shared helpers for integration tests
#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use crossbeam_channel::{unbounded, Receiver};

/// Build a metadata region: length byte followed by NUL-padded text
pub fn meta_block(text: &str) -> Vec<u8> {
    let blocks = text.len().div_ceil(16);
    let mut out = vec![blocks as u8];
    out.extend_from_slice(text.as_bytes());
    out.resize(1 + blocks * 16, 0);
    out
}

/// Standard response head of an ICY server
pub fn icy_head(metaint: usize) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: audio/mpeg\r\n\
         icy-name: Test FM\r\n\
         icy-br: 128\r\n\
         icy-metaint: {metaint}\r\n\
         Connection: close\r\n\r\n"
    )
}

/// Serve exactly one connection on localhost.
///
/// Writes `head`, then runs `script` against the socket, then closes it.
/// Returns the URL to connect to and a receiver for the raw request.
pub fn serve_once<F>(head: String, script: F) -> (String, Receiver<String>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (req_tx, req_rx) = unbounded();

    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let request = read_request(&mut stream);
        let _ = req_tx.send(request);
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        script(&mut stream);
    });

    (format!("http://{addr}/stream"), req_rx)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&request).into_owned()
}

/// Blocking reader fed from a channel; a disconnected sender ends the stream
pub struct ChannelReader {
    pub rx: Receiver<Vec<u8>>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.rx.recv() {
            Ok(chunk) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Err(_) => Ok(0),
        }
    }
}

/// Reader that hands out at most `step` bytes per call
pub struct TrickleReader {
    pub data: Vec<u8>,
    pub pos: usize,
    pub step: usize,
}

impl TrickleReader {
    pub fn new(data: Vec<u8>, step: usize) -> Self {
        Self { data, pos: 0, step }
    }
}

impl Read for TrickleReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
