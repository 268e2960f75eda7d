//! Errors surfaced by session-controller operations to the boundary API.

use crate::transport::TransportError;
use localchat_core::port::PortMapError;
use localchat_core::types::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidRoom(#[from] ValidationError),

    #[error(transparent)]
    Bind(#[from] TransportError),

    #[error("send attempted before a successful join")]
    NotInRoom,
}

impl SessionError {
    /// The taxonomy name surfaced as `ServerMessage::Error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidRoom(_) => "InvalidRoom",
            SessionError::Bind(TransportError::PortMap(PortMapError::BindExhausted { .. })) => {
                "BindExhausted"
            }
            SessionError::Bind(_) => "BindExhausted",
            SessionError::NotInRoom => "NotInRoom",
        }
    }
}
