//! # ivsnet
//!
//! Encrypted infection-risk propagation over contact networks.
//!
//! Each person's infection status is encrypted with Fully Homomorphic
//! Encryption. A query walks the contact graph breadth-first and folds
//! neighbors' encrypted statuses into an encrypted Individual Vulnerability
//! Score (IVS); only that final aggregate is ever decrypted.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (network cells, ciphertexts, risk classification)
//! - `ports`: Trait definitions for the encryption substrate
//! - `adapters`: Concrete implementations (tfhe-rs, log sanitization)
//! - `application`: Network generation, risk propagation and query service
//! - `config`: Environment-driven engine settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use config::EngineConfig;
pub use domain::{ContactNetwork, EdgeActivation, RiskAssessment, RiskLevel, Verdict};

/// Result type for ivsnet operations
pub type Result<T> = std::result::Result<T, IvsError>;

/// Main error type for ivsnet
#[derive(Debug, thiserror::Error)]
pub enum IvsError {
    #[error("Invalid person index {index}: expected a value between 0 and {}", .persons.saturating_sub(1))]
    InvalidPersonIndex { index: i64, persons: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ciphertext key context mismatch: expected {expected}, found {found}")]
    ContextMismatch { expected: String, found: String },

    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(domain::CryptoError),

    #[error("Invalid data: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IvsError {
    /// Whether an interactive caller may report the error and prompt again.
    ///
    /// Bad query input is recoverable; substrate failures abort the query.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidPersonIndex { .. })
    }
}

impl From<domain::CryptoError> for IvsError {
    fn from(err: domain::CryptoError) -> Self {
        use domain::CryptoError;

        match err {
            CryptoError::ContextMismatch { expected, found } => {
                Self::ContextMismatch { expected, found }
            }
            CryptoError::Decoding(msg) => Self::DecodeFailure(msg),
            other => Self::Crypto(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CryptoError;

    #[test]
    fn test_crypto_errors_are_lifted() {
        let err: IvsError = CryptoError::ContextMismatch {
            expected: "a".into(),
            found: "b".into(),
        }
        .into();
        assert!(matches!(err, IvsError::ContextMismatch { .. }));

        let err: IvsError = CryptoError::Decoding("short".into()).into();
        assert!(matches!(err, IvsError::DecodeFailure(_)));

        let err: IvsError = CryptoError::Encoding("empty".into()).into();
        assert!(matches!(err, IvsError::Crypto(CryptoError::Encoding(_))));
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(IvsError::InvalidInput("x".into()).is_recoverable());
        assert!(IvsError::InvalidPersonIndex { index: 9, persons: 3 }.is_recoverable());
        assert!(!IvsError::DecodeFailure("bad".into()).is_recoverable());
        assert!(!IvsError::ContextMismatch {
            expected: "a".into(),
            found: "b".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_index_error_message() {
        let msg = IvsError::InvalidPersonIndex { index: 3, persons: 3 }.to_string();
        assert!(msg.contains("between 0 and 2"));
    }
}
