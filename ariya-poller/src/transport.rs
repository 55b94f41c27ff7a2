//! TCP request/response primitive for the adapter.
//!
//! The adapter marks the end of a reply with a `>` prompt only in some modes,
//! so nothing here looks for a terminator: every command is followed by a
//! fixed settle delay and a single best-effort read.

use log::{debug, warn};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::PollError;

/// Largest reply read after a command
pub const MAX_REPLY_LEN: usize = 4096;

/// Host and port of the WiFi adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, PollError> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| self.invalid())?
            .collect();
        if addrs.is_empty() {
            return Err(self.invalid());
        }
        Ok(addrs)
    }

    fn invalid(&self) -> PollError {
        PollError::InvalidEndpoint {
            endpoint: self.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One open session with the adapter
pub trait AdapterConnection {
    /// Send `command` followed by a carriage return and return the trimmed
    /// reply, or `None` if nothing could be read.
    ///
    /// A failed write is an error; a failed read is not.
    fn send(&mut self, command: &str) -> Result<Option<String>, PollError>;

    /// Deliberate pause between two commands
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Opens sessions with the adapter
pub trait Transport {
    type Connection: AdapterConnection;

    /// Cheap reachability check; every failure maps to `false`
    fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> bool;

    /// Open the connection used for the rest of one refresh cycle
    fn open(&self, endpoint: &Endpoint, timeout: Duration) -> Result<Self::Connection, PollError>;
}

/// Plain TCP transport to an ELM327 WiFi adapter
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    settle_delay: Duration,
}

impl TcpTransport {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        match connect(endpoint, timeout) {
            Ok(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
                true
            }
            Err(e) => {
                debug!("Probe of {endpoint} failed: {e}");
                false
            }
        }
    }

    fn open(&self, endpoint: &Endpoint, timeout: Duration) -> Result<TcpConnection, PollError> {
        debug!(
            "Connecting to adapter at {endpoint} (timeout: {}ms)",
            timeout.as_millis()
        );
        let stream = connect(endpoint, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(TcpConnection {
            stream,
            settle_delay: self.settle_delay,
        })
    }
}

/// Try every resolved address until one connects
fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream, PollError> {
    let mut last_error = None;
    for addr in endpoint.resolve()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(PollError::Connect {
        endpoint: endpoint.to_string(),
        source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)),
    })
}

/// TCP session with the adapter; the socket is shut down on drop
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    settle_delay: Duration,
}

impl AdapterConnection for TcpConnection {
    fn send(&mut self, command: &str) -> Result<Option<String>, PollError> {
        debug!("Sending to adapter: {command:?}");
        self.stream.write_all(format!("{command}\r").as_bytes())?;

        // No end-of-reply marker: give the adapter time to finish sending
        std::thread::sleep(self.settle_delay);

        let mut buffer = [0u8; MAX_REPLY_LEN];
        match self.stream.read(&mut buffer) {
            Ok(n) => {
                let reply = decode_reply(&buffer[..n]);
                debug!("Reply to {command}: {reply:?}");
                Ok(Some(reply))
            }
            Err(e) => {
                warn!("No reply to {command}: {e}");
                Ok(None)
            }
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        debug!("Closing adapter connection");
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Decode reply bytes as text, dropping invalid UTF-8, and trim it
fn decode_reply(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect::<String>()
        .trim()
        .to_string()
}
