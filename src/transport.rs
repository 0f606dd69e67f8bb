//! Channel transport between controller and agent.
//!
//! The channel is a Unix domain socket at a well-known path, one fresh
//! connection per message: `send` writes the program and closes, `request`
//! writes a tagged line and reads until the agent closes its side. No
//! pooling and no keep-alive — the agent never has to manage long-lived
//! client state, and a crashed controller cannot leave it blocked on a
//! half-open connection.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};

/// Well-known channel name, the `\\.\pipe\<name>` analogue.
pub const CHANNEL_NAME: &str = "hookline-agent";

/// Connect/IO bound for a single send or request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Prefix marking a request/response exchange on the first line.
pub const REQUEST_TAG: &str = "__REQ:";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("agent channel not found")]
    NotFound,
    #[error("channel operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Socket path for a channel name, under the system temp directory.
pub fn channel_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}.sock", name))
}

/// A named channel endpoint on the controller side.
#[derive(Debug, Clone)]
pub struct Channel {
    path: PathBuf,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            path: channel_path(name),
        }
    }

    /// Channel at an explicit socket path.
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Zero-wait liveness check. Returns false only on a definitive
    /// does-not-exist; any ambiguous failure counts as reachable so a
    /// transient stat error never masks a live agent.
    pub fn probe(&self) -> bool {
        match std::fs::symlink_metadata(&self.path) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(_) => true,
        }
    }

    async fn connect(&self, timeout: Duration) -> Result<UnixStream, TransportError> {
        if !self.probe() {
            return Err(TransportError::NotFound);
        }
        match tokio::time::timeout(timeout, UnixStream::connect(&self.path)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e))
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::ConnectionRefused =>
            {
                Err(TransportError::NotFound)
            }
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Fire-and-forget delivery: fresh connection, full payload, flush,
    /// close. No acknowledgement is awaited.
    pub async fn send(&self, payload: &str, timeout: Duration) -> Result<(), TransportError> {
        let mut stream = self.connect(timeout).await?;
        tokio::time::timeout(timeout, async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await?;
            stream.shutdown().await?;
            Ok::<_, io::Error>(())
        })
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;
        debug!(bytes = payload.len(), "program sent");
        Ok(())
    }

    /// Synchronous query: write a tagged request line, read until the agent
    /// closes its write side.
    pub async fn request(&self, command: &str, timeout: Duration) -> Result<String, TransportError> {
        let mut stream = self.connect(timeout).await?;
        let response = tokio::time::timeout(timeout, async {
            stream
                .write_all(format!("{}{}\n", REQUEST_TAG, command).as_bytes())
                .await?;
            stream.flush().await?;
            stream.shutdown().await?;
            let mut response = String::new();
            stream.read_to_string(&mut response).await?;
            Ok::<_, io::Error>(response)
        })
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;
        Ok(response)
    }

    /// Spawn the send onto the runtime so the caller never blocks on
    /// channel I/O. Failures are reported through `on_error` rather than
    /// propagated — the command-processing flow must stay fault-free.
    pub fn send_detached<F>(&self, payload: String, timeout: Duration, on_error: F)
    where
        F: FnOnce(TransportError) + Send + 'static,
    {
        let channel = self.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.send(&payload, timeout).await {
                warn!(error = %e, "fire-and-forget send failed");
                on_error(e);
            }
        });
    }
}
