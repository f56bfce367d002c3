//! Building blocks for EMHS point-cloud layers.
//!
//! The crate hosts shape checks, activations and the cluster scatter/gather
//! primitives that layers use to pool point features by cluster or sample id.

pub mod activations;
pub mod checks;
pub mod cluster;

pub use activations::ActivationKind;
