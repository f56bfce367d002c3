//! Configuration options shared by all latent-class attention variants.
//!
//! [`AttentionType`] selects the variant and [`Config`] captures the widths
//! a layer binds at construction time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::AttentionError;

/// Which granularity queries the latent class embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttentionType {
    /// Every point queries the latent classes independently.
    #[default]
    #[serde(rename = "CLL", alias = "cll")]
    Cll,
    /// Cluster means query the latent classes; results are spread back to points.
    #[serde(rename = "CCL", alias = "ccl")]
    Ccl,
}

impl AttentionType {
    /// Canonical string used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionType::Cll => "CLL",
            AttentionType::Ccl => "CCL",
        }
    }
}

impl fmt::Display for AttentionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionType {
    type Err = AttentionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CLL" => Ok(AttentionType::Cll),
            "CCL" => Ok(AttentionType::Ccl),
            other => Err(AttentionError::InvalidConfig {
                message: format!("unknown attention type '{other}'"),
            }),
        }
    }
}

/// Configuration driving a latent-class attention module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Width of the point features attending to the classes.
    pub hidden_dim: usize,
    /// Number of learnable latent class embeddings.
    pub latent_classes: usize,
    /// Query granularity.
    pub attention_type: AttentionType,
}

impl Config {
    pub fn new(hidden_dim: usize, latent_classes: usize, attention_type: AttentionType) -> Self {
        Self {
            hidden_dim,
            latent_classes,
            attention_type,
        }
    }

    /// Rejects degenerate widths before any parameter is allocated.
    pub fn validate(&self) -> Result<(), AttentionError> {
        if self.hidden_dim == 0 {
            return Err(AttentionError::InvalidConfig {
                message: "hidden_dim must be greater than zero".into(),
            });
        }
        if self.latent_classes == 0 {
            return Err(AttentionError::InvalidConfig {
                message: "latent_classes must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
