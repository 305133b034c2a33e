//! Domain layer: Core types and rules.
//!
//! Plain Rust types with no knowledge of the FHE library. Ciphertexts are
//! carried as opaque serialized bytes.

mod crypto;
mod network;
mod risk;

pub use crypto::{ClientKey, CryptoError, EncryptedVector, KeyPair, ServerKey};
pub use network::{Cell, ContactNetwork, EdgeActivation, InfectionStatus, MAX_CONTACT_WEIGHT};
pub use risk::{
    InfectionScore, RiskAssessment, RiskLevel, SeverityWeights, Verdict, THRESHOLD_CAUTION,
    THRESHOLD_SAFE,
};
