//! Plaintext codec for tests.
//!
//! Implements the same port contract as the TFHE adapter (context and
//! dimension checks, empty-input rejection) but stores values in the clear,
//! so traversal properties can be checked without FHE key generation.
//! Operation counters let tests observe how many contributions were folded in.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{CryptoError, EncryptedVector};
use crate::ports::{check_context, check_operands, VectorCodec};

pub struct ClearCodec {
    fingerprint: String,
    encodes: AtomicUsize,
    adds: AtomicUsize,
    multiplies: AtomicUsize,
}

impl ClearCodec {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            encodes: AtomicUsize::new(0),
            adds: AtomicUsize::new(0),
            multiplies: AtomicUsize::new(0),
        }
    }

    pub fn encodes(&self) -> usize {
        self.encodes.load(Ordering::Relaxed)
    }

    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::Relaxed)
    }

    pub fn multiplies(&self) -> usize {
        self.multiplies.load(Ordering::Relaxed)
    }

    fn pack(&self, values: &[f64]) -> Result<EncryptedVector, CryptoError> {
        let ciphertext = bincode::serialize(values)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(EncryptedVector::new(
            ciphertext,
            values.len(),
            1,
            values.iter().fold(0.0_f64, |m, v| m.max(v.abs())),
            self.fingerprint.clone(),
        ))
    }

    fn unpack(encrypted: &EncryptedVector) -> Result<Vec<f64>, CryptoError> {
        bincode::deserialize(&encrypted.ciphertext)
            .map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    fn zip_with(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<EncryptedVector, CryptoError> {
        check_operands(&self.fingerprint, a, b)?;
        let left = Self::unpack(a)?;
        let right = Self::unpack(b)?;
        let out: Vec<f64> = left.iter().zip(&right).map(|(x, y)| op(*x, *y)).collect();
        self.pack(&out)
    }
}

impl VectorCodec for ClearCodec {
    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn encode(&self, values: &[f64]) -> Result<EncryptedVector, CryptoError> {
        if values.is_empty() {
            return Err(CryptoError::Encoding("cannot encode an empty vector".into()));
        }
        self.encodes.fetch_add(1, Ordering::Relaxed);
        self.pack(values)
    }

    fn decode(&self, encrypted: &EncryptedVector) -> Result<Vec<f64>, CryptoError> {
        check_context(&self.fingerprint, encrypted)?;
        Self::unpack(encrypted)
    }

    fn add(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
    ) -> Result<EncryptedVector, CryptoError> {
        self.adds.fetch_add(1, Ordering::Relaxed);
        self.zip_with(a, b, |x, y| x + y)
    }

    fn multiply(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
    ) -> Result<EncryptedVector, CryptoError> {
        self.multiplies.fetch_add(1, Ordering::Relaxed);
        self.zip_with(a, b, |x, y| x * y)
    }
}
