//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundary between
//! the risk engine and the FHE library.

mod vector_codec;

pub use vector_codec::{check_context, check_operands, VectorCodec};
