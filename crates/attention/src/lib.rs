//! Latent-class attention for EMHS point-cloud layers.
//!
//! Point features shaped `[points, hidden]` attend to a per-layer set of
//! learnable latent class embeddings. The number of classes is chosen per
//! layer group by the network assembler, and the query granularity (points or
//! cluster means) is selected with [`AttentionType`].
//!
//! Parameters are allocated through a `candle_nn::VarBuilder`, so attention
//! weights train together with the rest of the network.

pub mod core;
pub mod latent;

pub use crate::core::{Attention, AttentionError, AttentionType, Config};
pub use latent::LatentClassAttention;
