//! Unix socket boundary API server.
//!
//! Exposes a running [`NodeHandle`] to UI processes over the boundary API's
//! newline-delimited JSON protocol. Each connection gets its own handler
//! task; requests are forwarded to the node actor and the response is
//! written back. A connection that sends `Subscribe` additionally receives
//! every broadcast event for as long as it stays open.

use crate::node::NodeHandle;
use localchat_core::boundary::{self, ClientRequest, ServerMessage};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// The boundary API server managing the Unix socket.
pub struct BoundaryServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

impl BoundaryServer {
    /// Binds the server to `socket_path`, removing a stale socket file left
    /// behind by a previous daemon run that did not shut down cleanly.
    pub async fn bind(socket_path: &Path) -> std::io::Result<Self> {
        if socket_path.exists() {
            debug!(path = %socket_path.display(), "removing stale boundary socket");
            std::fs::remove_file(socket_path)?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the accept loop until the listener itself fails. Each accepted
    /// connection is handled on its own task against a clone of `node`.
    pub async fn run(self, node: NodeHandle) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let node = node.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, node).await {
                            debug!(error = %e, "boundary client disconnected");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept boundary connection");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }
}

impl Drop for BoundaryServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(path = %self.socket_path.display(), error = %e, "failed to remove boundary socket");
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    node: NodeHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let mut events: Option<broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            read_result = reader.read_line(&mut line) => {
                match read_result {
                    Ok(0) => return Ok(()),
                    Ok(_) => {
                        let request: ClientRequest = match boundary::decode_line(&line) {
                            Ok(request) => request,
                            Err(e) => {
                                warn!(error = %e, line = %line.trim(), "invalid boundary request");
                                let message = ServerMessage::Error {
                                    code: "InvalidRequest".into(),
                                    message: e.to_string(),
                                };
                                writer.write_all(boundary::encode_line(&message)?.as_bytes()).await?;
                                line.clear();
                                continue;
                            }
                        };

                        if matches!(request, ClientRequest::Subscribe) {
                            if events.is_none() {
                                events = Some(node.subscribe());
                                debug!("boundary client subscribed to events");
                            }
                            writer.write_all(boundary::encode_line(&ServerMessage::Ok)?.as_bytes()).await?;
                            line.clear();
                            continue;
                        }

                        let response = node.request(request).await;
                        writer.write_all(boundary::encode_line(&response)?.as_bytes()).await?;
                        line.clear();
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            event = async {
                match &mut events {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match event {
                    Ok(message) => {
                        writer.write_all(boundary::encode_line(&message)?.as_bytes()).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "boundary client lagged behind on events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use localchat_core::boundary::{decode_line, encode_line};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader};

    async fn request(stream: &mut UnixStream, request: &ClientRequest) -> ServerMessage {
        let line = encode_line(request).unwrap();
        stream.write_all(line.as_bytes()).await.unwrap();
        let mut reader = TokioBufReader::new(&mut *stream);
        let mut buf = String::new();
        reader.read_line(&mut buf).await.unwrap();
        decode_line(&buf).unwrap()
    }

    #[tokio::test]
    async fn join_and_send_round_trip_over_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("boundary.sock");

        let server = BoundaryServer::bind(&socket_path).await.unwrap();
        let node = crate::node::spawn();
        tokio::spawn(server.run(node));

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        let join = request(
            &mut client,
            &ClientRequest::JoinRoom {
                room: "boundary-test".into(),
                user_name: "Ada".into(),
            },
        )
        .await;
        assert!(matches!(join, ServerMessage::JoinResult { success: true, .. }));

        let sent = request(
            &mut client,
            &ClientRequest::SendMessage {
                structure: vec![localchat_core::types::Part::Text {
                    content: "hi".into(),
                }],
                files: vec![],
            },
        )
        .await;
        assert!(matches!(sent, ServerMessage::SendResult { success: true, .. }));
    }

    #[tokio::test]
    async fn unknown_request_before_join_returns_not_in_room() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("boundary.sock");

        let server = BoundaryServer::bind(&socket_path).await.unwrap();
        let node = crate::node::spawn();
        tokio::spawn(server.run(node));

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        let response = request(&mut client, &ClientRequest::LeaveRoom).await;
        assert!(matches!(response, ServerMessage::LeaveResult { success: true }));

        let response = request(
            &mut client,
            &ClientRequest::SendMessage {
                structure: vec![],
                files: vec![],
            },
        )
        .await;
        assert!(matches!(response, ServerMessage::Error { code, .. } if code == "NotInRoom"));
    }
}
