//! Trigger listener: the receiving end of the camera trigger protocol.
//!
//! Accepts TCP connections on the loopback interface, reads the trigger
//! token and answers each one with a short acknowledgement. Connections are
//! served concurrently and are closed when the client hangs up or stays
//! silent past the idle timeout.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::client::{DEFAULT_TRIGGER_PORT, DEFAULT_TRIGGER_TOKEN};

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Payload that counts as a trigger
    pub token: String,
    /// Reply sent for every accepted trigger
    pub ack: String,
    /// Read buffer size per connection
    pub buffer_size: usize,
    /// Close a connection after this long without data
    pub idle_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_TRIGGER_PORT,
            token: DEFAULT_TRIGGER_TOKEN.to_string(),
            ack: "ok".to_string(),
            buffer_size: 1024,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

impl ListenerConfig {
    /// Create a listener configuration for the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

/// Handle to a running listener.
pub struct ListenerHandle {
    addr: SocketAddr,
    counters: Arc<Counters>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Triggers received so far.
    pub fn triggers_received(&self) -> u64 {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    /// Payloads that did not match the trigger token.
    pub fn payloads_rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::error!("Trigger listener task failed: {}", e);
        }
    }
}

/// Bind the listener and serve connections on the current tokio runtime.
pub async fn run(config: ListenerConfig) -> anyhow::Result<ListenerHandle> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding trigger listener on {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;

    tracing::info!("Trigger listener on {}", addr);

    let counters = Arc::new(Counters::default());
    let config = Arc::new(config);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = {
        let counters = counters.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("Trigger listener shutdown signal received");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((socket, peer)) => {
                            let config = config.clone();
                            let counters = counters.clone();
                            tokio::spawn(async move {
                                let served = serve_connection(socket, peer, &config, &counters);
                                if let Err(e) = served.await {
                                    tracing::warn!("Connection from {} ended: {:#}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept failed: {}", e);
                        }
                    }
                }
            }
        })
    };

    Ok(ListenerHandle {
        addr,
        counters,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

async fn serve_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    config: &ListenerConfig,
    counters: &Counters,
) -> anyhow::Result<()> {
    let mut buffer = vec![0u8; config.buffer_size.max(1)];

    loop {
        let n = match tokio::time::timeout(config.idle_timeout, socket.read(&mut buffer)).await {
            Ok(read) => read.context("reading trigger payload")?,
            Err(_) => {
                tracing::debug!("Closing idle connection from {}", peer);
                return Ok(());
            }
        };
        if n == 0 {
            return Ok(());
        }

        let payload = String::from_utf8_lossy(&buffer[..n]);
        if payload.trim() == config.token {
            counters.accepted.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Trigger received from {}", peer);
            socket
                .write_all(config.ack.as_bytes())
                .await
                .context("writing trigger ack")?;
        } else {
            counters.rejected.fetch_add(1, Ordering::SeqCst);
            tracing::warn!("Unexpected payload ({} bytes) from {}", n, peer);
            socket
                .write_all(b"unknown")
                .await
                .context("writing rejection")?;
        }
    }
}
