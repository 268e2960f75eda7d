//! The room-derived cryptographic channel: key derivation and sealed-envelope
//! authenticated encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

/// The fixed salt used for every room's key derivation. A deliberate design
/// choice of this protocol: the room name itself is the only secret input,
/// so every node that knows the room name can derive the same key.
const PBKDF2_SALT: &[u8] = b"localchat2024salt";
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Associated data bound to every seal/open call. Not secret; it just scopes
/// the ciphertext to this protocol so it can't be replayed into another one.
const AEAD_ASSOCIATED_DATA: &[u8] = b"localchat";

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authentication failed while opening a sealed payload")]
    AeadFailure,

    #[error("malformed sealed payload: {0}")]
    MalformedInput(String),
}

/// A 32-byte key derived from a room name, plus the seal/open operations
/// under it.
#[derive(Clone)]
pub struct RoomKey([u8; 32]);

impl RoomKey {
    /// Derives the room key via PBKDF2-HMAC-SHA-256 with the fixed salt and
    /// iteration count pinned in the wire contract.
    pub fn derive(room_name: &str) -> Self {
        let mut key = [0u8; 32];
        pbkdf2::<Hmac<Sha256>>(
            room_name.as_bytes(),
            PBKDF2_SALT,
            PBKDF2_ITERATIONS,
            &mut key,
        )
        .expect("pbkdf2 output length matches HMAC-SHA-256 block constraints");
        Self(key)
    }

    /// Authenticated-encrypts `plaintext`, returning hex-encoded
    /// `(nonce, ciphertext, tag)`. A fresh random nonce is generated on
    /// every call — never reuse a nonce with this key.
    pub fn seal(&self, plaintext: &[u8]) -> Sealed {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        // aes-gcm appends the 16-byte tag to the ciphertext; split it back
        // out so the wire format carries nonce/ciphertext/tag as separate
        // hex fields, per the frozen envelope contract.
        let mut sealed = cipher
            .encrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: plaintext,
                    aad: AEAD_ASSOCIATED_DATA,
                },
            )
            .expect("AES-256-GCM encryption does not fail for valid inputs");
        let tag = sealed.split_off(sealed.len() - 16);

        Sealed {
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(sealed),
            tag: hex::encode(tag),
        }
    }

    /// Inverse of [`RoomKey::seal`]. Fails with [`CryptoError::AeadFailure`]
    /// on tag mismatch; callers must drop the datagram silently on error,
    /// never surface it to a peer.
    pub fn open(&self, sealed: &Sealed) -> Result<Vec<u8>, CryptoError> {
        let nonce_bytes = hex::decode(&sealed.nonce)
            .map_err(|e| CryptoError::MalformedInput(e.to_string()))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::MalformedInput("nonce must be 12 bytes".into()));
        }
        let ciphertext = hex::decode(&sealed.ciphertext)
            .map_err(|e| CryptoError::MalformedInput(e.to_string()))?;
        let tag = hex::decode(&sealed.tag).map_err(|e| CryptoError::MalformedInput(e.to_string()))?;
        if tag.len() != 16 {
            return Err(CryptoError::MalformedInput("tag must be 16 bytes".into()));
        }

        let mut combined = ciphertext;
        combined.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0));
        let nonce = Nonce::from_slice(&nonce_bytes);
        cipher
            .decrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: &combined,
                    aad: AEAD_ASSOCIATED_DATA,
                },
            )
            .map_err(|_| CryptoError::AeadFailure)
    }
}

/// The sealed form of a payload as it travels on the wire: nonce,
/// ciphertext, and authentication tag, each lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sealed {
    pub iv: String,
    pub encrypted: String,
    #[serde(rename = "authTag")]
    pub tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        let a = RoomKey::derive("demo");
        let b = RoomKey::derive("demo");
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn different_rooms_derive_different_keys() {
        let a = RoomKey::derive("demo");
        let b = RoomKey::derive("other");
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn seal_then_open_round_trips() {
        let key = RoomKey::derive("team-meeting");
        let plaintext = b"hello from node A";
        let sealed = key.seal(plaintext);
        let opened = key.open(&sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn tampered_tag_fails_to_open() {
        let key = RoomKey::derive("team-meeting");
        let mut sealed = key.seal(b"hello");
        sealed.tag = "00".repeat(16);
        assert!(matches!(key.open(&sealed), Err(CryptoError::AeadFailure)));
    }

    #[test]
    fn nonce_is_fresh_per_seal() {
        let key = RoomKey::derive("team-meeting");
        let a = key.seal(b"same plaintext");
        let b = key.seal(b"same plaintext");
        assert_ne!(a.iv, b.iv);
    }
}
