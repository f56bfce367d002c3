use thiserror::Error;

/// Problems detected while validating a network description.
///
/// Every variant is raised before any layer is allocated; a network is either
/// built completely or not at all.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{0} is undefined")]
    Missing(&'static str),

    #[error(
        "latent_classes has {latent_classes} entries but layers_slice defines {groups} groups"
    )]
    LatentClassMismatch { latent_classes: usize, groups: usize },

    #[error("layers_slice covers {covered} distinct layers, expected {expected}")]
    LayerCoverage { covered: usize, expected: usize },

    #[error("layers_slice must cover 0..{expected}, got {first}..={last}")]
    LayerRange {
        first: usize,
        last: usize,
        expected: usize,
    },

    #[error("layer {0} registered more than once")]
    DuplicateLayer(usize),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Format(String),
}

impl ConfigurationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(value: toml::de::Error) -> Self {
        ConfigurationError::Format(value.to_string())
    }
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(value: serde_json::Error) -> Self {
        ConfigurationError::Format(value.to_string())
    }
}

/// Errors surfaced while building a network.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("layer construction failed: {0}")]
    Candle(#[from] candle_core::Error),
}
