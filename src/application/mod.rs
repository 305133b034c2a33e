//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with the codec port to implement
//! network generation and encrypted risk queries.

mod generator;
mod propagation;
mod service;
mod worker;

pub use generator::{GeneratedNetwork, NetworkGenerator};
pub use propagation::{Propagation, RiskPropagator, BASE_RISK};
pub use service::RiskService;
pub use worker::{QueryProgress, QueryWorker, QueryWorkerHandle};
