//! localchat-cli — a thin reference client for the boundary API.
//!
//! Connects to a running `localchatd` over its Unix socket and issues one
//! boundary request per invocation, or drops into an interactive REPL that
//! keeps the connection open and prints pushed events as they arrive.

mod ipc_client;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ipc_client::BoundaryClient;
use localchat_core::boundary::{ClientRequest, ServerMessage};
use localchat_core::types::Part;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "localchat-cli", about = "localchat reference client")]
struct Cli {
    /// Path to the daemon's boundary API socket.
    #[arg(long)]
    socket_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join a room.
    Join {
        room: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Send a plain-text message to the currently joined room.
    Send { text: String },
    /// List currently known peers.
    Peers,
    /// Leave the currently joined room.
    Leave,
    /// Open an interactive session: join a room, then read lines from
    /// stdin as outgoing messages while printing incoming events.
    Repl {
        room: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LOCALCHAT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let socket_path = cli
        .socket_path
        .unwrap_or_else(localchat_core::socket::default_socket_path);

    match cli.command {
        Command::Join { room, name } => {
            let mut client = BoundaryClient::connect(&socket_path).await?;
            client
                .send(&ClientRequest::JoinRoom {
                    room,
                    user_name: name,
                })
                .await?;
            print_response(client.recv().await?);
        }
        Command::Send { text } => {
            let mut client = BoundaryClient::connect(&socket_path).await?;
            client
                .send(&ClientRequest::SendMessage {
                    structure: vec![Part::Text { content: text }],
                    files: vec![],
                })
                .await?;
            print_response(client.recv().await?);
        }
        Command::Peers => {
            let mut client = BoundaryClient::connect(&socket_path).await?;
            client.send(&ClientRequest::GetPeers).await?;
            print_response(client.recv().await?);
        }
        Command::Leave => {
            let mut client = BoundaryClient::connect(&socket_path).await?;
            client.send(&ClientRequest::LeaveRoom).await?;
            print_response(client.recv().await?);
        }
        Command::Repl { room, name } => repl(&socket_path, room, name).await?,
    }

    Ok(())
}

fn print_response(message: ServerMessage) {
    match message {
        ServerMessage::Error { code, message } => eprintln!("error [{code}]: {message}"),
        other => println!("{other:?}"),
    }
}

/// Joins `room`, subscribes to events, and alternates between reading a
/// line of stdin (sent as a text message) and printing any pushed event.
/// Stdin is read on a blocking thread and forwarded over a channel so the
/// async event stream keeps flowing while the user is typing.
async fn repl(socket_path: &std::path::Path, room: String, name: String) -> Result<()> {
    let mut client = BoundaryClient::connect(socket_path).await?;
    client
        .send(&ClientRequest::JoinRoom {
            room: room.clone(),
            user_name: name,
        })
        .await?;
    match client.recv().await? {
        ServerMessage::JoinResult {
            success: true,
            port,
        } => println!("joined {room} on port {}", port.unwrap_or_default()),
        ServerMessage::Error { code, message } => {
            return Err(anyhow!("join failed [{code}]: {message}"))
        }
        other => return Err(anyhow!("unexpected join response: {other:?}")),
    }
    client.subscribe().await.context("failed to subscribe")?;

    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut input = String::new();
        loop {
            input.clear();
            print!("> ");
            let _ = std::io::stdout().flush();
            if stdin.read_line(&mut input).unwrap_or(0) == 0 {
                break;
            }
            let line = input.trim().to_string();
            if !line.is_empty() && line_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let send_client = &mut client;
    loop {
        tokio::select! {
            Some(line) = line_rx.recv() => {
                let request = ClientRequest::SendMessage {
                    structure: vec![Part::Text { content: line }],
                    files: vec![],
                };
                if let Err(e) = send_client.send(&request).await {
                    error!(error = %e, "failed to send message");
                }
            }
            message = send_client.recv() => {
                match message {
                    Ok(message) => print_response(message),
                    Err(e) => {
                        error!(error = %e, "disconnected from daemon");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
