//! Attention from point features to a small set of learnable latent classes.
//!
//! Each query is softly assigned to `latent_classes` embeddings with a scaled
//! dot product, and the projected class embeddings are mixed back with those
//! weights. [`AttentionType::Cll`] queries with every point;
//! [`AttentionType::Ccl`] queries with cluster means and spreads the result
//! back to the points of each cluster.

use std::sync::OnceLock;

use candle_core::Tensor;
use candle_nn::{ops::softmax_last_dim, Linear, Module, VarBuilder};
use layers::{checks, cluster};

use crate::core::{Attention, AttentionError, AttentionType, Config};

/// Learnable latent-class attention bound to a fixed width and class count.
pub struct LatentClassAttention {
    config: Config,
    classes: Tensor,
    query: Linear,
    value: Linear,
    scale: f64,
    first_call: OnceLock<()>,
}

impl std::fmt::Debug for LatentClassAttention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatentClassAttention")
            .field("hidden_dim", &self.config.hidden_dim)
            .field("latent_classes", &self.config.latent_classes)
            .field("attention_type", &self.config.attention_type)
            .finish()
    }
}

impl LatentClassAttention {
    /// Allocates class embeddings and projections under `vb`.
    pub fn new(config: Config, vb: VarBuilder) -> Result<Self, AttentionError> {
        config.validate()?;
        let hidden = config.hidden_dim;
        let classes = vb.get_with_hints(
            (config.latent_classes, hidden),
            "classes",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let query = candle_nn::linear(hidden, hidden, vb.pp("query"))?;
        let value = candle_nn::linear(hidden, hidden, vb.pp("value"))?;
        let scale = 1.0 / (hidden as f64).sqrt();
        Ok(Self {
            config,
            classes,
            query,
            value,
            scale,
            first_call: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Soft class assignment for `queries` shaped `[rows, hidden]`.
    fn mix_classes(&self, queries: &Tensor) -> candle_core::Result<Tensor> {
        let projected = self.query.forward(queries)?;
        let scores = projected
            .matmul(&self.classes.t()?)?
            .affine(self.scale, 0.0)?;
        let weights = softmax_last_dim(&scores)?;
        let values = self.value.forward(&self.classes)?;
        weights.matmul(&values)
    }
}

impl Attention for LatentClassAttention {
    fn attend(
        &self,
        hidden: &Tensor,
        consecutive_cluster: &Tensor,
        clusters: usize,
    ) -> Result<Tensor, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::latent init type={} hidden={} classes={}",
                self.config.attention_type,
                self.config.hidden_dim,
                self.config.latent_classes
            );
        }

        checks::expect_points_channels("attention.hidden", hidden, self.config.hidden_dim)
            .map_err(|err| AttentionError::InvalidShape {
                context: err.to_string(),
            })?;

        let mixed = match self.config.attention_type {
            AttentionType::Cll => self.mix_classes(hidden)?,
            AttentionType::Ccl => {
                let pooled = cluster::scatter_mean(hidden, consecutive_cluster, clusters)?;
                let per_cluster = self.mix_classes(&pooled)?;
                cluster::gather(&per_cluster, consecutive_cluster)?
            }
        };
        Ok(mixed)
    }
}
