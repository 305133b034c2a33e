//! Adapters layer: Concrete implementations of ports.
//!
//! - `tfhe`: tfhe-rs backed encrypted vector codec
//! - `sanitize`: redaction of statuses and key material in logs

#[cfg(test)]
pub(crate) mod clear;
pub mod sanitize;
pub mod tfhe;
