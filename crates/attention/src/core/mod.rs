//! Core traits and types shared across latent-class attention variants.
//!
//! Implementations operate on point features laid out as
//! `[points, hidden]` together with a dense per-point cluster id in
//! `[0, clusters)`. The output mirrors the input layout and dtype so callers
//! can add it residually.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::{AttentionType, Config};
pub use errors::AttentionError;

/// Unified interface for latent-class attention.
///
/// * `hidden` is `[points, hidden_dim]`.
/// * `consecutive_cluster` is a rank-1 integer tensor of length `points`.
/// * `clusters` is the number of dense cluster ids.
/// * The returned tensor is `[points, hidden_dim]`.
pub trait Attention {
    fn attend(
        &self,
        hidden: &Tensor,
        consecutive_cluster: &Tensor,
        clusters: usize,
    ) -> Result<Tensor, AttentionError>;
}
