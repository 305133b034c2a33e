//! Vector codec port: Trait for encrypted-vector arithmetic.
//!
//! This trait abstracts the FHE library (tfhe-rs) from the risk engine.
//! Callers may only encode, decode, add and multiply. Ciphertexts cannot be
//! compared or indexed, so every branch in the engine is taken on plaintext.

use crate::domain::{CryptoError, EncryptedVector};

/// Trait for element-wise homomorphic operations on real-valued vectors.
///
/// The scheme is approximate: `decode(encode(v))` is only close to `v`.
/// Implementations hold their key context, which must not change after
/// construction so the codec can be shared across threads.
pub trait VectorCodec: Send + Sync {
    /// Fingerprint of the key context all ciphertexts of this codec carry.
    fn fingerprint(&self) -> &str;

    /// Encrypt a plaintext vector.
    ///
    /// # Errors
    /// Returns `CryptoError::Encoding` for empty input or values the scheme
    /// cannot represent.
    fn encode(&self, values: &[f64]) -> Result<EncryptedVector, CryptoError>;

    /// Decrypt a ciphertext into approximate plaintext values.
    ///
    /// # Errors
    /// Returns `CryptoError::ContextMismatch` for foreign ciphertexts and
    /// `CryptoError::Decoding` if the result is malformed.
    fn decode(&self, encrypted: &EncryptedVector) -> Result<Vec<f64>, CryptoError>;

    /// Element-wise homomorphic addition.
    ///
    /// # Errors
    /// Returns `CryptoError::ContextMismatch` or `CryptoError::DimensionMismatch`
    /// for incompatible operands.
    fn add(&self, a: &EncryptedVector, b: &EncryptedVector)
        -> Result<EncryptedVector, CryptoError>;

    /// Element-wise homomorphic multiplication.
    ///
    /// # Errors
    /// Same as [`VectorCodec::add`], plus `CryptoError::ScaleExhausted` when
    /// the product would exceed the supported fixed-point depth.
    fn multiply(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
    ) -> Result<EncryptedVector, CryptoError>;
}

/// Check that both operands belong to `expected` and have equal length.
///
/// Shared by codec implementations before touching ciphertext payloads.
pub fn check_operands(
    expected: &str,
    a: &EncryptedVector,
    b: &EncryptedVector,
) -> Result<(), CryptoError> {
    check_context(expected, a)?;
    check_context(expected, b)?;
    if a.len() != b.len() {
        return Err(CryptoError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Check that a ciphertext was produced under `expected`.
pub fn check_context(expected: &str, encrypted: &EncryptedVector) -> Result<(), CryptoError> {
    if encrypted.key_fingerprint != expected {
        return Err(CryptoError::ContextMismatch {
            expected: expected.to_string(),
            found: encrypted.key_fingerprint.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_operands() {
        let a = EncryptedVector::new(vec![], 3, 1, 1.0, "ctx-a");
        let b = EncryptedVector::new(vec![], 3, 1, 1.0, "ctx-a");
        let foreign = EncryptedVector::new(vec![], 3, 1, 1.0, "ctx-b");
        let short = EncryptedVector::new(vec![], 2, 1, 1.0, "ctx-a");

        assert!(check_operands("ctx-a", &a, &b).is_ok());
        assert!(matches!(
            check_operands("ctx-a", &a, &foreign),
            Err(CryptoError::ContextMismatch { .. })
        ));
        assert_eq!(
            check_operands("ctx-a", &a, &short),
            Err(CryptoError::DimensionMismatch { left: 3, right: 2 })
        );
    }
}
