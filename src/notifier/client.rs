//! Camera trigger client.
//!
//! Every trigger is a brand-new TCP connection: connect, send the token,
//! wait once for a reply, close. There is no pooling and no retry, so an
//! unreachable camera costs at most one connect timeout per trigger.

use super::Notifier;
use crate::stats::SharedSessionStats;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default camera trigger port.
pub const DEFAULT_TRIGGER_PORT: u16 = 9090;

/// Default trigger payload.
pub const DEFAULT_TRIGGER_TOKEN: &str = "trigger_camera";

/// Trigger endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Endpoint host (default: 127.0.0.1)
    pub host: String,
    /// Endpoint port
    pub port: u16,
    /// Payload sent as the whole message, without framing
    pub token: String,
    #[serde(with = "crate::config::duration_ms")]
    pub connect_timeout: Duration,
    #[serde(with = "crate::config::duration_ms")]
    pub read_timeout: Duration,
    #[serde(with = "crate::config::duration_ms")]
    pub write_timeout: Duration,
    /// Size of the buffer for the single response read
    pub response_buffer: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_TRIGGER_PORT,
            token: DEFAULT_TRIGGER_TOKEN.to_string(),
            connect_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(500),
            response_buffer: 1024,
        }
    }
}

impl NotifierConfig {
    /// Create a configuration for the given endpoint with default timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Endpoint as `host:port`.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the endpoint sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerReply {
    /// Bytes read; zero means the peer closed without replying
    pub bytes: usize,
    /// Reply decoded as lossy UTF-8
    pub body: String,
}

/// Trigger client errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyError {
    /// The endpoint address could not be resolved
    Resolve(String),
    /// The connection could not be established
    Connect(String),
    /// The token could not be written
    Send(String),
    /// No reply arrived within the read timeout
    ReadTimeout(Duration),
    /// The reply could not be read
    Read(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Resolve(msg) => write!(f, "Trigger endpoint resolution failed: {msg}"),
            NotifyError::Connect(msg) => write!(f, "Socket connection failed: {msg}"),
            NotifyError::Send(msg) => write!(f, "Error sending trigger message: {msg}"),
            NotifyError::ReadTimeout(timeout) => {
                write!(f, "No reply from trigger endpoint within {timeout:?}")
            }
            NotifyError::Read(msg) => write!(f, "Error reading trigger reply: {msg}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Sends camera triggers over short-lived TCP connections.
pub struct TriggerClient {
    config: NotifierConfig,
    stats: Option<SharedSessionStats>,
}

impl TriggerClient {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            stats: None,
        }
    }

    /// Count delivered and failed triggers into the session stats.
    pub fn with_stats(mut self, stats: SharedSessionStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Run one connect/send/read/close exchange.
    pub fn send_trigger(&self) -> Result<TriggerReply, NotifyError> {
        let addr = self.resolve()?;

        let mut stream = TcpStream::connect_timeout(&addr, self.config.connect_timeout)
            .map_err(|e| NotifyError::Connect(format!("{addr}: {e}")))?;

        let result = self.exchange(&mut stream);

        // The stream is closed on drop either way; shutdown just makes the
        // close visible to the peer before we return.
        let _ = stream.shutdown(Shutdown::Both);
        result
    }

    fn resolve(&self) -> Result<SocketAddr, NotifyError> {
        (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| NotifyError::Resolve(format!("{}: {e}", self.config.endpoint())))?
            .next()
            .ok_or_else(|| {
                NotifyError::Resolve(format!("{}: no addresses", self.config.endpoint()))
            })
    }

    fn exchange(&self, stream: &mut TcpStream) -> Result<TriggerReply, NotifyError> {
        stream
            .set_write_timeout(Some(self.config.write_timeout))
            .map_err(|e| NotifyError::Send(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.config.read_timeout))
            .map_err(|e| NotifyError::Read(e.to_string()))?;
        let _ = stream.set_nodelay(true);

        stream
            .write_all(self.config.token.as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        let mut buffer = vec![0u8; self.config.response_buffer.max(1024)];
        match stream.read(&mut buffer) {
            Ok(0) => {
                tracing::debug!("No data received from the server.");
                Ok(TriggerReply {
                    bytes: 0,
                    body: String::new(),
                })
            }
            Ok(n) => Ok(TriggerReply {
                bytes: n,
                body: String::from_utf8_lossy(&buffer[..n]).into_owned(),
            }),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(NotifyError::ReadTimeout(self.config.read_timeout))
            }
            Err(e) => Err(NotifyError::Read(e.to_string())),
        }
    }
}

impl Notifier for TriggerClient {
    fn trigger(&self) -> bool {
        tracing::debug!("sending trigger message to {}", self.config.endpoint());
        match self.send_trigger() {
            Ok(reply) => {
                tracing::info!(bytes = reply.bytes, "Trigger acknowledged: {}", reply.body.trim());
                if let Some(stats) = &self.stats {
                    stats.record_trigger_delivered();
                }
                true
            }
            Err(e) => {
                tracing::warn!("{e}");
                if let Some(stats) = &self.stats {
                    stats.record_trigger_failed();
                }
                false
            }
        }
    }
}
