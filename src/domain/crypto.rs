//! Cryptographic types for encrypted-vector arithmetic.
//!
//! Wrappers around serialized tfhe-rs material with additional safety guarantees.
//!
//! # Memory Security
//!
//! Key types implement `Zeroize` and `ZeroizeOnDrop` so secret material is
//! erased when no longer needed.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for cryptographic operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Decoding failed: {0}")]
    Decoding(String),

    #[error("Homomorphic computation failed: {0}")]
    Computation(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Ciphertext was produced under key context {found}, expected {expected}")]
    ContextMismatch { expected: String, found: String },

    #[error("Operand length mismatch: {left} vs {right} slots")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Fixed-point scale exhausted: level {level} exceeds maximum {max}")]
    ScaleExhausted { level: u32, max: u32 },

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

/// Client-side secret key for encoding/decoding.
///
/// Only the party that is allowed to see final scores holds this key.
///
/// # Security
///
/// - Implements `ZeroizeOnDrop`: key material is securely erased when dropped
/// - `Debug` implementation does NOT expose key bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ClientKey {
    /// Serialized key bytes (tfhe-rs ClientKey)
    pub(crate) inner: Vec<u8>,

    /// Key fingerprint for identification (NOT secret)
    #[zeroize(skip)]
    pub fingerprint: String,
}

impl ClientKey {
    /// Create a new client key from raw bytes.
    ///
    /// The caller must ensure the bytes represent a valid tfhe-rs ClientKey.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Evaluation key for homomorphic computation.
///
/// Allows add/multiply on ciphertexts but CANNOT decrypt.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ServerKey {
    /// Serialized key bytes (tfhe-rs ServerKey)
    pub(crate) inner: Vec<u8>,

    #[zeroize(skip)]
    pub fingerprint: String,
}

impl ServerKey {
    /// Create a new server key from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }
}

impl std::fmt::Debug for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKey")
            .field("fingerprint", &self.fingerprint)
            .field("size_bytes", &self.inner.len())
            .finish()
    }
}

/// Key pair containing both client and server keys.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub client: ClientKey,
    pub server: ServerKey,
}

impl KeyPair {
    /// Create a new key pair.
    pub fn new(client: ClientKey, server: ServerKey) -> Self {
        Self { client, server }
    }

    /// Identifier of the key pair ciphertexts are bound to.
    ///
    /// This is the client key fingerprint, since that is the key that
    /// encrypted them. Codecs extend it with their own encoding parameters.
    #[must_use]
    pub fn context_fingerprint(&self) -> &str {
        &self.client.fingerprint
    }
}

/// An encrypted vector of fixed-point values.
///
/// The payload is opaque to everything except the codec that produced it.
/// Values are immutable: every homomorphic operation yields a new vector.
#[derive(Clone)]
pub struct EncryptedVector {
    /// Serialized per-slot ciphertexts
    pub ciphertext: Vec<u8>,

    /// Number of plaintext slots
    pub len: usize,

    /// Fixed-point scale level (value = integer / 2^(precision_bits * level))
    pub scale_level: u32,

    /// Upper bound on the absolute plaintext value of any slot
    pub magnitude: f64,

    /// Fingerprint of the key context used for encryption
    pub key_fingerprint: String,
}

impl EncryptedVector {
    /// Create a new encrypted vector.
    pub fn new(
        ciphertext: Vec<u8>,
        len: usize,
        scale_level: u32,
        magnitude: f64,
        key_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            ciphertext,
            len,
            scale_level,
            magnitude,
            key_fingerprint: key_fingerprint.into(),
        }
    }

    /// Get the size of the ciphertext in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.ciphertext.len()
    }

    /// Number of encrypted slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for EncryptedVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedVector")
            .field("len", &self.len)
            .field("scale_level", &self.scale_level)
            .field("magnitude", &self.magnitude)
            .field("size_bytes", &self.ciphertext.len())
            .field("key_fingerprint", &self.key_fingerprint)
            .finish()
    }
}

/// Compute a fingerprint for key identification using SHA-256.
///
/// Only the first 8 bytes of the digest are kept; the fingerprint identifies a
/// key without revealing its material.
fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();

    result[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_key_debug_no_leak() {
        let key = ClientKey::from_bytes(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let debug_output = format!("{key:?}");

        assert!(!debug_output.contains("1, 2, 3"));
        assert!(debug_output.contains("fingerprint"));
    }

    #[test]
    fn test_fingerprint_uses_hash() {
        let fp = compute_fingerprint(&[0xde, 0xad, 0xbe, 0xef]);
        assert_ne!(fp, "deadbeef");
        assert_eq!(fp.len(), 16);
    }

    #[test]
    fn test_same_key_same_fingerprint() {
        assert_eq!(compute_fingerprint(&[1, 2, 3, 4]), compute_fingerprint(&[1, 2, 3, 4]));
        assert_ne!(compute_fingerprint(&[1, 2, 3, 4]), compute_fingerprint(&[4, 3, 2, 1]));
    }

    #[test]
    fn test_context_fingerprint_is_client_fingerprint() {
        let pair = KeyPair::new(
            ClientKey::from_bytes(vec![7; 32]),
            ServerKey::from_bytes(vec![9; 32]),
        );
        assert_eq!(pair.context_fingerprint(), pair.client.fingerprint);
        assert_ne!(pair.context_fingerprint(), pair.server.fingerprint);
    }

    #[test]
    fn test_encrypted_vector_debug_hides_payload() {
        let encrypted = EncryptedVector::new(vec![0xab; 1024], 5, 1, 1.0, "ctx");
        assert_eq!(encrypted.size_bytes(), 1024);
        assert_eq!(encrypted.len(), 5);

        let debug_output = format!("{encrypted:?}");
        assert!(debug_output.contains("size_bytes: 1024"));
        assert!(!debug_output.contains("171"));
    }
}
