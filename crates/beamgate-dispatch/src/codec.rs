//! Frame-body codecs for the manager transport.
//!
//! Every frame travels through a [`PayloadCodec`] before it hits the wire
//! and after it is read back. [`PlainCodec`] is the identity transform;
//! [`SealedCodec`] applies XChaCha20-Poly1305 with the wire format
//! `nonce (24 bytes) || ciphertext || tag (16 bytes)`.

use std::fmt;
use std::str::FromStr;

use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use rand::RngCore;

/// Size of a [`TransportKey`] in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the XChaCha20-Poly1305 nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Minimum size of a valid sealed frame body (nonce + tag, no plaintext).
pub const MIN_SEALED_SIZE: usize = NONCE_SIZE + TAG_SIZE;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The key material is not exactly 32 bytes (64 hex characters).
    #[error("transport key must be {KEY_SIZE} bytes")]
    InvalidKeyLength,
    /// The key string is not valid hex.
    #[error("transport key is not valid hex")]
    InvalidKeyEncoding,
    /// The frame body is shorter than nonce + tag.
    #[error("sealed frame is too short")]
    FrameTooShort,
    /// Authentication failed: the frame was tampered with or sealed
    /// under a different key.
    #[error("frame failed authentication")]
    OpenFailed,
    /// The cipher rejected the plaintext.
    #[error("frame could not be sealed")]
    SealFailed,
}

/// A 256-bit key for [`SealedCodec`].
///
/// Configuration carries it as 64 hex characters.
#[derive(Clone)]
pub struct TransportKey {
    bytes: [u8; KEY_SIZE],
}

impl TransportKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKeyLength`] if the slice is not
    /// exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CodecError::InvalidKeyLength)?;
        Ok(Self { bytes })
    }

    /// Generates a random key from a cryptographically secure RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// The raw key bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl FromStr for TransportKey {
    type Err = CodecError;

    fn from_str(hex_key: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| CodecError::InvalidKeyEncoding)?;
        Self::from_bytes(&bytes)
    }
}

impl TryFrom<&[u8]> for TransportKey {
    type Error = CodecError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for TransportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Transform applied to every frame body.
pub trait PayloadCodec: Send + Sync + fmt::Debug {
    /// Prepares a payload for the wire.
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Recovers a payload read from the wire.
    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Identity codec: frames travel as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl PayloadCodec for PlainCodec {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(plaintext.to_vec())
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(sealed.to_vec())
    }
}

/// XChaCha20-Poly1305 codec.
///
/// Each sealed frame carries its own random nonce, so sealing the same
/// payload twice produces different bytes.
#[derive(Clone)]
pub struct SealedCodec {
    key: TransportKey,
}

impl SealedCodec {
    /// Creates a codec sealing with the given key.
    #[must_use]
    pub fn new(key: TransportKey) -> Self {
        Self { key }
    }
}

impl PayloadCodec for SealedCodec {
    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CodecError::SealFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        if sealed.len() < MIN_SEALED_SIZE {
            return Err(CodecError::FrameTooShort);
        }

        let cipher = XChaCha20Poly1305::new(self.key.as_bytes().into());
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let nonce = nonce_bytes.into();

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CodecError::OpenFailed)
    }
}

impl fmt::Debug for SealedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_codec_is_identity() {
        let codec = PlainCodec;
        let payload = br#"{"method":"status","params":{}}"#;

        assert_eq!(codec.seal(payload).unwrap(), payload);
        assert_eq!(codec.open(payload).unwrap(), payload);
    }

    #[test]
    fn sealed_roundtrip() {
        let codec = SealedCodec::new(TransportKey::generate());
        let payload = br#"{"method":"queue_start","params":{}}"#;

        let sealed = codec.seal(payload).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + payload.len() + TAG_SIZE);
        assert_eq!(codec.open(&sealed).unwrap(), payload);
    }

    #[test]
    fn sealed_frames_are_never_repeated() {
        let codec = SealedCodec::new(TransportKey::generate());
        let payload = b"same payload";

        let first = codec.seal(payload).unwrap();
        let second = codec.seal(payload).unwrap();
        assert_ne!(first, second);
        assert_eq!(codec.open(&first).unwrap(), payload);
        assert_eq!(codec.open(&second).unwrap(), payload);
    }

    #[test]
    fn open_rejects_wrong_key() {
        let sealer = SealedCodec::new(TransportKey::generate());
        let opener = SealedCodec::new(TransportKey::generate());

        let sealed = sealer.seal(b"secret").unwrap();
        assert_eq!(opener.open(&sealed), Err(CodecError::OpenFailed));
    }

    #[test]
    fn open_rejects_tampered_frame() {
        let codec = SealedCodec::new(TransportKey::generate());

        let mut sealed = codec.seal(b"secret").unwrap();
        sealed[NONCE_SIZE + 1] ^= 0xFF;
        assert_eq!(codec.open(&sealed), Err(CodecError::OpenFailed));
    }

    #[test]
    fn open_rejects_short_frame() {
        let codec = SealedCodec::new(TransportKey::generate());
        let short = vec![0u8; MIN_SEALED_SIZE - 1];
        assert_eq!(codec.open(&short), Err(CodecError::FrameTooShort));
    }

    #[test]
    fn key_parses_from_hex() {
        let hex_key = "0b".repeat(KEY_SIZE);
        let key: TransportKey = hex_key.parse().unwrap();
        assert_eq!(key.as_bytes(), &[0x0b; KEY_SIZE]);

        assert_eq!(
            "not-hex".parse::<TransportKey>().unwrap_err(),
            CodecError::InvalidKeyEncoding
        );
        assert_eq!(
            "0b0b".parse::<TransportKey>().unwrap_err(),
            CodecError::InvalidKeyLength
        );
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = TransportKey::generate();
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
    }
}
