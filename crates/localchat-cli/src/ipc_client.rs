//! Boundary API client for connecting to a running localchatd.
//!
//! Connects to the daemon's Unix domain socket and provides typed
//! send/recv methods over the newline-delimited JSON protocol.

use localchat_core::boundary::{self, ClientRequest, ServerMessage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tracing::debug;

#[derive(Debug, Error)]
pub enum BoundaryClientError {
    #[error("daemon is not running (socket not found at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("boundary protocol error: {0}")]
    Protocol(String),

    #[error("connection to daemon closed")]
    Disconnected,
}

/// A connection to a running daemon's boundary API socket.
pub struct BoundaryClient {
    reader: BufReader<ReadHalf<UnixStream>>,
    writer: WriteHalf<UnixStream>,
    line_buf: String,
}

impl BoundaryClient {
    pub async fn connect(path: &Path) -> Result<Self, BoundaryClientError> {
        if !path.exists() {
            return Err(BoundaryClientError::DaemonNotRunning(path.to_owned()));
        }
        let stream = UnixStream::connect(path).await?;
        let (reader, writer) = tokio::io::split(stream);
        debug!(path = %path.display(), "connected to daemon");
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            line_buf: String::with_capacity(4096),
        })
    }

    pub async fn send(&mut self, request: &ClientRequest) -> Result<(), BoundaryClientError> {
        let line = boundary::encode_line(request)
            .map_err(|e| BoundaryClientError::Protocol(e.to_string()))?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ServerMessage, BoundaryClientError> {
        self.line_buf.clear();
        let bytes_read = self.reader.read_line(&mut self.line_buf).await?;
        if bytes_read == 0 {
            return Err(BoundaryClientError::Disconnected);
        }
        boundary::decode_line(&self.line_buf).map_err(|e| BoundaryClientError::Protocol(e.to_string()))
    }

    pub async fn subscribe(&mut self) -> Result<(), BoundaryClientError> {
        self.send(&ClientRequest::Subscribe).await?;
        match self.recv().await? {
            ServerMessage::Ok => Ok(()),
            ServerMessage::Error { code, message } => {
                Err(BoundaryClientError::Protocol(format!("{code}: {message}")))
            }
            _ => Err(BoundaryClientError::Protocol(
                "unexpected response to subscribe".into(),
            )),
        }
    }
}
