//! TFHE adapter: Implementation of VectorCodec using tfhe-rs.
//!
//! Each vector slot is an `FheInt64` holding a fixed-point value
//! `round(v * 2^precision_bits)`.
//!
//! # Fixed-point scale
//!
//! A ciphertext carries a scale level `l`; its plaintext value is
//! `integer / 2^(precision_bits * l)`. Encoding produces level 1, a product
//! has the sum of its operands' levels, and addition first lifts the lower
//! operand with a clear scalar multiplication so both sides share a scale.
//! Rescaling would need encrypted division, which is far more expensive than
//! carrying the level, so levels are capped at [`MAX_SCALE_LEVEL`] instead.
//!
//! Every ciphertext also carries a plaintext bound on its slot magnitudes.
//! An operation whose result could leave the `i64` range at its scale is
//! refused instead of wrapping.
//!
//! # Key context
//!
//! The codec fingerprint is the client key fingerprint plus the precision,
//! e.g. `726f5cf819ed374b-p12`. Ciphertexts encoded at another precision are
//! rejected like ciphertexts from another key.
//!
//! # Thread Safety
//!
//! **IMPORTANT**: `tfhe::set_server_key()` writes to a *thread-local* (TLS) global.
//!
//! Every homomorphic operation installs the server key for its own duration
//! through an RAII guard, so the codec can be shared across threads and no
//! key leaks into unrelated work on the same thread.

use tfhe::prelude::*;
use tfhe::{
    generate_keys, set_server_key, unset_server_key, ClientKey as TfheClientKey, ConfigBuilder,
    FheInt64, ServerKey as TfheServerKey,
};

use crate::domain::{ClientKey, CryptoError, EncryptedVector, KeyPair, ServerKey};
use crate::ports::{check_context, check_operands, VectorCodec};

/// Default fixed-point precision (2^12 = 4096).
pub const DEFAULT_PRECISION_BITS: u32 = 12;

/// Supported range of precision bits.
pub const PRECISION_BITS_RANGE: std::ops::RangeInclusive<u32> = 4..=20;

/// Deepest product a ciphertext may carry.
pub const MAX_SCALE_LEVEL: u32 = 3;

/// Largest magnitude accepted by `encode`.
///
/// Keeps level-3 products of encoded values inside `i64` at the default
/// precision.
pub const MAX_ABS_VALUE: f64 = 1.0e6;

/// Largest fixed-point integer an operation may produce (2^62, half the
/// `i64` range, which absorbs rounding in the operands).
const MAX_RAW_MAGNITUDE: f64 = 4_611_686_018_427_387_904.0;

/// TFHE codec for encrypted vector arithmetic.
///
/// Holds the client key (encode/decode) and the server key (add/multiply) of
/// one key context. Both are read-only after construction.
pub struct TfheCodec {
    client_key: TfheClientKey,
    server_key: TfheServerKey,
    fingerprint: String,
    precision_bits: u32,
}

/// Installs the server key in TLS and clears it on drop.
struct ServerKeyGuard;

impl ServerKeyGuard {
    fn install(key: &TfheServerKey) -> Self {
        set_server_key(key.clone());
        Self
    }
}

impl Drop for ServerKeyGuard {
    fn drop(&mut self) {
        unset_server_key();
    }
}

impl TfheCodec {
    /// Generate a fresh key context and build a codec on it.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if key generation fails.
    pub fn generate(precision_bits: u32) -> Result<Self, CryptoError> {
        let keys = Self::generate_keys()?;
        Self::from_keys(&keys, precision_bits)
    }

    /// Generate a new serialized key pair.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if the keys cannot be serialized.
    pub fn generate_keys() -> Result<KeyPair, CryptoError> {
        tracing::info!("Generating FHE key pair...");

        let config = ConfigBuilder::default().build();
        let (client_key, server_key) = generate_keys(config);

        let client_bytes = bincode::serialize(&client_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize client key: {e}"))
        })?;
        let server_bytes = bincode::serialize(&server_key).map_err(|e| {
            CryptoError::KeyGeneration(format!("Failed to serialize server key: {e}"))
        })?;

        let keys = KeyPair::new(
            ClientKey::from_bytes(client_bytes),
            ServerKey::from_bytes(server_bytes),
        );
        tracing::info!(
            "Generated keys - Client fingerprint: {}, Server fingerprint: {}",
            keys.client.fingerprint,
            keys.server.fingerprint
        );
        Ok(keys)
    }

    /// Build a codec from an existing serialized key pair.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the keys do not deserialize
    /// or the precision is unsupported.
    pub fn from_keys(keys: &KeyPair, precision_bits: u32) -> Result<Self, CryptoError> {
        if !PRECISION_BITS_RANGE.contains(&precision_bits) {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "precision_bits {precision_bits} outside {PRECISION_BITS_RANGE:?}"
            )));
        }

        let client_key: TfheClientKey = bincode::deserialize(keys.client.as_bytes())
            .map_err(|e| {
                CryptoError::InvalidKeyFormat(format!("Failed to deserialize client key: {e}"))
            })?;
        let server_key: TfheServerKey = bincode::deserialize(keys.server.as_bytes())
            .map_err(|e| {
                CryptoError::InvalidKeyFormat(format!("Failed to deserialize server key: {e}"))
            })?;

        let fingerprint = format!("{}-p{precision_bits}", keys.context_fingerprint());
        tracing::info!("TfheCodec ready (context={fingerprint}, precision_bits={precision_bits})");

        Ok(Self {
            client_key,
            server_key,
            fingerprint,
            precision_bits,
        })
    }

    #[must_use]
    pub fn precision_bits(&self) -> u32 {
        self.precision_bits
    }

    /// `2^(precision_bits * level)` as a float divisor.
    fn scale(&self, level: u32) -> f64 {
        2f64.powi((self.precision_bits * level) as i32)
    }

    /// Clear multiplier lifting a ciphertext by `levels` scale levels.
    fn lift_factor(&self, levels: u32) -> Result<i64, CryptoError> {
        1i64.checked_shl(self.precision_bits * levels)
            .filter(|f| *f > 0)
            .ok_or_else(|| CryptoError::Computation(format!("lift by {levels} levels overflows")))
    }

    /// Refuse results whose fixed-point integers could overflow `i64`.
    fn check_headroom(&self, magnitude: f64, level: u32) -> Result<(), CryptoError> {
        let raw = magnitude * self.scale(level);
        if !raw.is_finite() || raw > MAX_RAW_MAGNITUDE {
            return Err(CryptoError::Computation(format!(
                "result magnitude {magnitude:e} at scale level {level} overflows the fixed-point range"
            )));
        }
        Ok(())
    }

    fn quantize(&self, value: f64) -> Result<i64, CryptoError> {
        if !value.is_finite() {
            return Err(CryptoError::Encoding(format!("non-finite value {value}")));
        }
        if value.abs() > MAX_ABS_VALUE {
            return Err(CryptoError::Encoding(format!(
                "value {value} exceeds the encodable magnitude {MAX_ABS_VALUE}"
            )));
        }
        Ok((value * self.scale(1)).round() as i64)
    }

    fn unpack(encrypted: &EncryptedVector) -> Result<Vec<FheInt64>, CryptoError> {
        let slots: Vec<FheInt64> = bincode::deserialize(&encrypted.ciphertext).map_err(|e| {
            CryptoError::Serialization(format!("Failed to deserialize ciphertext: {e}"))
        })?;
        if slots.len() != encrypted.len() {
            return Err(CryptoError::Decoding(format!(
                "ciphertext holds {} slots, header says {}",
                slots.len(),
                encrypted.len()
            )));
        }
        Ok(slots)
    }

    fn pack(
        &self,
        slots: &[FheInt64],
        scale_level: u32,
        magnitude: f64,
    ) -> Result<EncryptedVector, CryptoError> {
        let ciphertext = bincode::serialize(slots).map_err(|e| {
            CryptoError::Serialization(format!("Failed to serialize ciphertext: {e}"))
        })?;
        Ok(EncryptedVector::new(
            ciphertext,
            slots.len(),
            scale_level,
            magnitude,
            self.fingerprint.clone(),
        ))
    }

    /// Bring `slots` from level `from` up to level `to`.
    fn lift(&self, slots: Vec<FheInt64>, from: u32, to: u32) -> Result<Vec<FheInt64>, CryptoError> {
        if from == to {
            return Ok(slots);
        }
        let factor = self.lift_factor(to - from)?;
        Ok(slots.iter().map(|slot| slot * factor).collect())
    }
}

impl VectorCodec for TfheCodec {
    fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn encode(&self, values: &[f64]) -> Result<EncryptedVector, CryptoError> {
        if values.is_empty() {
            return Err(CryptoError::Encoding("cannot encode an empty vector".into()));
        }

        let mut slots = Vec::with_capacity(values.len());
        for (i, &value) in values.iter().enumerate() {
            let quantized = self.quantize(value)?;
            slots.push(FheInt64::encrypt(quantized, &self.client_key));
            tracing::trace!("Encrypted slot {i}");
        }

        let magnitude = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let encrypted = self.pack(&slots, 1, magnitude)?;
        tracing::debug!(
            "Encoded {} slots (ciphertext size: {} bytes)",
            encrypted.len(),
            encrypted.size_bytes()
        );
        Ok(encrypted)
    }

    fn decode(&self, encrypted: &EncryptedVector) -> Result<Vec<f64>, CryptoError> {
        check_context(&self.fingerprint, encrypted)?;
        if encrypted.scale_level == 0 || encrypted.scale_level > MAX_SCALE_LEVEL {
            return Err(CryptoError::Decoding(format!(
                "invalid scale level {}",
                encrypted.scale_level
            )));
        }

        let divisor = self.scale(encrypted.scale_level);
        let values: Vec<f64> = Self::unpack(encrypted)?
            .iter()
            .map(|slot| {
                let raw: i64 = slot.decrypt(&self.client_key);
                raw as f64 / divisor
            })
            .collect();

        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(CryptoError::Decoding(format!("slot {bad} decoded to a non-finite value")));
        }
        tracing::debug!("Decoded {} slots", values.len());
        Ok(values)
    }

    fn add(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
    ) -> Result<EncryptedVector, CryptoError> {
        check_operands(&self.fingerprint, a, b)?;
        let level = a.scale_level.max(b.scale_level);
        let magnitude = a.magnitude + b.magnitude;
        self.check_headroom(magnitude, level)?;
        let _server_key_guard = ServerKeyGuard::install(&self.server_key);

        let left = self.lift(Self::unpack(a)?, a.scale_level, level)?;
        let right = self.lift(Self::unpack(b)?, b.scale_level, level)?;

        let sum: Vec<FheInt64> = left.iter().zip(&right).map(|(x, y)| x + y).collect();
        tracing::trace!("Homomorphic add over {} slots at level {level}", sum.len());
        self.pack(&sum, level, magnitude)
    }

    fn multiply(
        &self,
        a: &EncryptedVector,
        b: &EncryptedVector,
    ) -> Result<EncryptedVector, CryptoError> {
        check_operands(&self.fingerprint, a, b)?;
        let level = a.scale_level + b.scale_level;
        if level > MAX_SCALE_LEVEL {
            return Err(CryptoError::ScaleExhausted {
                level,
                max: MAX_SCALE_LEVEL,
            });
        }
        let magnitude = a.magnitude * b.magnitude;
        self.check_headroom(magnitude, level)?;
        let _server_key_guard = ServerKeyGuard::install(&self.server_key);

        let left = Self::unpack(a)?;
        let right = Self::unpack(b)?;
        let product: Vec<FheInt64> = left.iter().zip(&right).map(|(x, y)| x * y).collect();
        tracing::trace!("Homomorphic multiply over {} slots at level {level}", product.len());
        self.pack(&product, level, magnitude)
    }
}

/// Keys shared by tests; key generation is too slow to repeat per test.
#[cfg(test)]
pub(crate) fn shared_test_keys() -> &'static KeyPair {
    use std::sync::OnceLock;

    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| TfheCodec::generate_keys().expect("test keys"))
}

#[cfg(test)]
pub(crate) fn shared_test_codec() -> &'static TfheCodec {
    use std::sync::OnceLock;

    static CODEC: OnceLock<TfheCodec> = OnceLock::new();
    CODEC.get_or_init(|| {
        TfheCodec::from_keys(shared_test_keys(), DEFAULT_PRECISION_BITS).expect("test codec")
    })
}
