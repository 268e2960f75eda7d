//! The UDP transport: owns the one socket a session binds, sends
//! fire-and-forget datagrams, and yields inbound ones to the frame codec.

use localchat_core::port::{fallback_sequence, PortMapError};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

const BIND_WATCHDOG: Duration = Duration::from_secs(2);
const MAX_DATAGRAM: usize = 65_536;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    PortMap(#[from] PortMapError),

    #[error("bind attempt timed out")]
    BindTimeout,

    #[error("fatal bind error: {0}")]
    Bind(#[source] io::Error),

    #[error("send error: {0}")]
    Send(#[source] io::Error),
}

/// The broadcast destination for a room: `255.255.255.255` on the room's
/// base port.
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 255);

pub struct UdpTransport {
    socket: UdpSocket,
    bound_port: u16,
    /// The room's canonical base port from the port map. A transport that
    /// fell back to `base_port + n` after an `AddrInUse` still broadcasts to
    /// `base_port`, since that's the port every other node in the room
    /// listens on — broadcasting to this transport's own (possibly
    /// fallen-back) port would reach no one.
    base_port: u16,
}

impl UdpTransport {
    /// Binds a broadcast-enabled socket using the room's port-map fallback
    /// sequence: base port, then up to four sequential alternates.
    pub async fn bind(room_name: &str) -> Result<Self, TransportError> {
        let base_port = localchat_core::port::port(room_name);
        let mut last_err = None;
        for port in fallback_sequence(room_name) {
            let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
            match tokio::time::timeout(BIND_WATCHDOG, UdpSocket::bind(addr)).await {
                Ok(Ok(socket)) => {
                    socket.set_broadcast(true).map_err(TransportError::Bind)?;
                    debug!(port, "udp transport bound");
                    return Ok(Self {
                        socket,
                        bound_port: port,
                        base_port,
                    });
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::AddrInUse => {
                    debug!(port, "address in use, trying next fallback port");
                    last_err = Some(e);
                }
                Ok(Err(e)) => return Err(TransportError::Bind(e)),
                Err(_) => return Err(TransportError::BindTimeout),
            }
        }
        let _ = last_err;
        Err(TransportError::PortMap(PortMapError::BindExhausted { base: base_port }))
    }

    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    /// Fire-and-forget send. `PermissionDenied` is suppressed (common with
    /// broadcast addresses on locked-down hosts); other errors are logged
    /// but never propagated per-datagram.
    pub async fn send_to(&self, bytes: &[u8], dest: SocketAddr) {
        match self.socket.send_to(bytes, dest).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(%dest, "send permission denied, suppressing");
            }
            Err(e) => {
                warn!(%dest, error = %e, "udp send failed");
            }
        }
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(BROADCAST_ADDR, self.base_port))
    }

    /// Awaits the next inbound datagram, returning its payload and source.
    pub async fn recv(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_succeeds_and_reports_a_port_in_range() {
        let transport = UdpTransport::bind("transport-unit-test").await.unwrap();
        assert!((12000..13000).contains(&transport.bound_port()));
    }

    #[tokio::test]
    async fn second_bind_for_the_same_room_falls_back_to_the_next_port() {
        let room = "transport-fallback-test";
        let first = UdpTransport::bind(room).await.unwrap();
        let second = UdpTransport::bind(room).await.unwrap();

        assert_eq!(second.bound_port(), first.bound_port() + 1);
        // Both still agree on where the room broadcasts, regardless of
        // which port either one actually bound to.
        assert_eq!(first.broadcast_addr(), second.broadcast_addr());
    }

    #[tokio::test]
    async fn bind_exhausted_after_five_contending_transports() {
        let room = "transport-exhaustion-test";
        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(UdpTransport::bind(room).await.unwrap());
        }

        let err = UdpTransport::bind(room).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::PortMap(PortMapError::BindExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn send_and_recv_round_trip_on_loopback() {
        let a = UdpTransport::bind("transport-roundtrip-a").await.unwrap();
        let b = UdpTransport::bind("transport-roundtrip-b").await.unwrap();
        let b_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), b.bound_port());

        a.send_to(b"hello", b_addr).await;
        let (payload, _from) = b.recv().await.unwrap();
        assert_eq!(payload, b"hello");
    }
}
