//! Activation catalogue for point-wise feature transforms.
//!
//! Activations consume `(points, channels)` tensors and return tensors with
//! identical layout and dtype.

use std::fmt;
use std::str::FromStr;

use candle_core::{Error, Result, Tensor};
use serde::{Deserialize, Serialize};

/// Identifies which non-linearity is applied inside an EMHS element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationKind {
    /// Identity function, useful for debugging or wiring custom stacks.
    #[serde(alias = "none")]
    Identity,
    /// Rectified linear unit.
    #[default]
    Relu,
    /// GeLU using the erf formulation.
    Gelu,
    /// SiLU (a.k.a. swish).
    #[serde(alias = "swish")]
    Silu,
}

impl ActivationKind {
    /// Applies the activation to `input`.
    pub fn apply(self, input: &Tensor) -> Result<Tensor> {
        match self {
            ActivationKind::Identity => Ok(input.clone()),
            ActivationKind::Relu => input.relu(),
            ActivationKind::Gelu => input.gelu_erf(),
            ActivationKind::Silu => input.silu(),
        }
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivationKind::Identity => "identity",
            ActivationKind::Relu => "relu",
            ActivationKind::Gelu => "gelu",
            ActivationKind::Silu => "silu",
        };
        f.write_str(name)
    }
}

impl FromStr for ActivationKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(ActivationKind::Identity),
            "relu" => Ok(ActivationKind::Relu),
            "gelu" => Ok(ActivationKind::Gelu),
            "silu" | "swish" => Ok(ActivationKind::Silu),
            other => Err(Error::Msg(format!("unknown activation '{other}'"))),
        }
    }
}
