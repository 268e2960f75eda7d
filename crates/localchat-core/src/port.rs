//! Deterministic room-name-to-UDP-port mapping.

use md5::{Digest, Md5};
use thiserror::Error;

const BASE_PORT: u16 = 12000;
const PORT_RANGE: u16 = 1000;
const MAX_BIND_ATTEMPTS: u16 = 5;

#[derive(Debug, Error)]
pub enum PortMapError {
    #[error("exhausted {MAX_BIND_ATTEMPTS} bind attempts starting at port {base}")]
    BindExhausted { base: u16 },
}

/// `12000 + (first 16 bits of MD5(room) interpreted big-endian) mod 1000`.
///
/// Deterministic and identical on every node that agrees on the room name,
/// so peers converge on the same port without any coordination.
pub fn port(room_name: &str) -> u16 {
    let digest = Md5::digest(room_name.as_bytes());
    let first_u16 = u16::from_be_bytes([digest[0], digest[1]]);
    BASE_PORT + (first_u16 % PORT_RANGE)
}

/// The sequence of ports a bind attempt should try, in order: the base port
/// from [`port`], then `base+1` through `base+4`.
pub fn fallback_sequence(room_name: &str) -> impl Iterator<Item = u16> {
    let base = port(room_name);
    (0..MAX_BIND_ATTEMPTS).map(move |offset| base + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_is_in_range() {
        for room in ["demo", "team-meeting", "a", "Zzz123"] {
            let p = port(room);
            assert!((12000..13000).contains(&p));
        }
    }

    #[test]
    fn port_is_deterministic() {
        assert_eq!(port("team-meeting"), port("team-meeting"));
    }

    #[test]
    fn golden_team_meeting_port() {
        // Pinned literal (MD5("team-meeting") = 391e2b48..., first two bytes
        // 0x391e = 14622, 14622 % 1000 = 622) so a regression in the
        // derivation — wrong byte order, wrong modulus — is actually caught
        // instead of the test recomputing the same possibly-broken formula.
        assert_eq!(port("team-meeting"), 12622);
    }

    #[test]
    fn fallback_sequence_has_five_ports_starting_at_base() {
        let base = port("demo");
        let seq: Vec<u16> = fallback_sequence("demo").collect();
        assert_eq!(seq, vec![base, base + 1, base + 2, base + 3, base + 4]);
    }
}
