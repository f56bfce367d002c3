use std::{fs, path::Path};

use attention::AttentionType;
use layers::ActivationKind;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::{error::ConfigurationError, partition::LayerPartition};

/// Three-axis grid description, either one value for every axis or one per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    Uniform(usize),
    PerAxis(Vec<usize>),
}

impl GridSpec {
    /// Normalises the description to exactly three positive extents.
    pub fn resolve(&self, field: &'static str) -> Result<[usize; 3], ConfigurationError> {
        let dims = match self {
            GridSpec::Uniform(value) => [*value; 3],
            GridSpec::PerAxis(values) => <[usize; 3]>::try_from(values.as_slice()).map_err(|_| {
                ConfigurationError::invalid(
                    field,
                    format!("expected 3 entries, got {}", values.len()),
                )
            })?,
        };
        if dims.contains(&0) {
            return Err(ConfigurationError::invalid(
                field,
                format!("entries must be positive, got {:?}", dims),
            ));
        }
        Ok(dims)
    }
}

impl From<[usize; 3]> for GridSpec {
    fn from(value: [usize; 3]) -> Self {
        GridSpec::PerAxis(value.to_vec())
    }
}

/// User-facing description of an EMHS network.
///
/// Required options are `Option`s so that a missing value is reported as a
/// [`ConfigurationError::Missing`] rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmhsModelConfig {
    #[serde(default)]
    pub input_nc: Option<usize>,
    #[serde(default)]
    pub output_nc: Option<usize>,
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    #[serde(default = "default_num_elm")]
    pub num_elm: usize,
    #[serde(default = "default_use_attention")]
    pub use_attention: bool,
    #[serde(default)]
    pub layers_slice: Option<Vec<usize>>,
    #[serde(default)]
    pub latent_classes: Option<Vec<usize>>,
    #[serde(default = "default_voxelization")]
    pub voxelization: GridSpec,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: GridSpec,
    #[serde(default = "default_feat_dim")]
    pub feat_dim: usize,
    #[serde(default)]
    pub attention_type: AttentionType,
    #[serde(default)]
    pub activation: ActivationKind,
}

fn default_num_layers() -> usize {
    56
}

fn default_num_elm() -> usize {
    2
}

fn default_use_attention() -> bool {
    true
}

fn default_voxelization() -> GridSpec {
    GridSpec::from([9, 9, 9])
}

fn default_kernel_size() -> GridSpec {
    GridSpec::from([3, 3, 3])
}

fn default_feat_dim() -> usize {
    64
}

impl Default for EmhsModelConfig {
    fn default() -> Self {
        Self {
            input_nc: None,
            output_nc: None,
            num_layers: default_num_layers(),
            num_elm: default_num_elm(),
            use_attention: default_use_attention(),
            layers_slice: None,
            latent_classes: None,
            voxelization: default_voxelization(),
            kernel_size: default_kernel_size(),
            feat_dim: default_feat_dim(),
            attention_type: AttentionType::default(),
            activation: ActivationKind::default(),
        }
    }
}

/// Fully validated settings consumed by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModelConfig {
    pub input_nc: usize,
    pub output_nc: usize,
    pub partition: LayerPartition,
    pub num_elm: usize,
    pub use_attention: bool,
    pub latent_classes: Option<Vec<usize>>,
    pub voxelization: [usize; 3],
    pub kernel_size: [usize; 3],
    pub feat_dim: usize,
    pub attention_type: AttentionType,
    pub activation: ActivationKind,
}

impl EmhsModelConfig {
    /// Config with the required options set and every other option at its default.
    pub fn new(input_nc: usize, output_nc: usize, layers_slice: Vec<usize>) -> Self {
        Self {
            input_nc: Some(input_nc),
            output_nc: Some(output_nc),
            layers_slice: Some(layers_slice),
            ..Self::default()
        }
    }

    pub fn with_latent_classes(mut self, latent_classes: Vec<usize>) -> Self {
        self.latent_classes = Some(latent_classes);
        self
    }

    /// Reads a TOML or JSON file, chosen by extension, and validates it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: EmhsModelConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(ConfigurationError::Format(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with one top-level option replaced, e.g. `feat_dim=32`
    /// or `latent_classes[1]=8`.
    pub fn with_override(&self, key: &str, raw: &str) -> Result<Self, ConfigurationError> {
        let mut value = serde_json::to_value(self)?;
        let new_value = parse_override_value(raw);

        let (field, index) = match key.trim().split_once('[') {
            Some((field, rest)) => {
                let index = rest.trim_end_matches(']').parse::<usize>().map_err(|err| {
                    ConfigurationError::Format(format!("invalid index in override '{key}': {err}"))
                })?;
                (field, Some(index))
            }
            None => (key.trim(), None),
        };
        if field.is_empty() {
            return Err(ConfigurationError::Format(
                "override key must not be empty".into(),
            ));
        }

        let object = value
            .as_object_mut()
            .ok_or_else(|| ConfigurationError::Format("config is not an object".into()))?;
        match index {
            None => {
                object.insert(field.to_string(), new_value);
            }
            Some(index) => {
                let slot = object
                    .get_mut(field)
                    .and_then(Value::as_array_mut)
                    .and_then(|items| items.get_mut(index))
                    .ok_or_else(|| {
                        ConfigurationError::Format(format!(
                            "override '{key}' does not address an existing list entry"
                        ))
                    })?;
                *slot = new_value;
            }
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Checks every construction-time invariant and resolves the layer partition.
    pub fn validate(&self) -> Result<ResolvedModelConfig, ConfigurationError> {
        let input_nc = self.input_nc.ok_or(ConfigurationError::Missing("input_nc"))?;
        let output_nc = self
            .output_nc
            .ok_or(ConfigurationError::Missing("output_nc"))?;
        let layers_slice = self
            .layers_slice
            .as_ref()
            .ok_or(ConfigurationError::Missing("layers_slice"))?;

        let groups = layers_slice.len().saturating_sub(1);
        let latent_classes = if self.use_attention {
            let latent = self
                .latent_classes
                .as_ref()
                .ok_or(ConfigurationError::Missing("latent_classes"))?;
            if latent.len() != groups {
                return Err(ConfigurationError::LatentClassMismatch {
                    latent_classes: latent.len(),
                    groups,
                });
            }
            if latent.contains(&0) {
                return Err(ConfigurationError::invalid(
                    "latent_classes",
                    "every group needs at least one latent class",
                ));
            }
            Some(latent.clone())
        } else {
            if self.latent_classes.is_some() {
                log::debug!("latent_classes ignored because use_attention is false");
            }
            None
        };

        if self.feat_dim == 0 {
            return Err(ConfigurationError::invalid(
                "feat_dim",
                "must be greater than zero",
            ));
        }
        if self.num_elm == 0 {
            return Err(ConfigurationError::invalid(
                "num_elm",
                "must be greater than zero",
            ));
        }
        let voxelization = self.voxelization.resolve("voxelization")?;
        let kernel_size = self.kernel_size.resolve("kernel_size")?;

        let partition = LayerPartition::new(layers_slice, self.num_layers)?;

        Ok(ResolvedModelConfig {
            input_nc,
            output_nc,
            partition,
            num_elm: self.num_elm,
            use_attention: self.use_attention,
            latent_classes,
            voxelization,
            kernel_size,
            feat_dim: self.feat_dim,
            attention_type: self.attention_type,
            activation: self.activation,
        })
    }
}

fn parse_override_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(int_val) = trimmed.parse::<u64>() {
        return Value::Number(Number::from(int_val));
    }
    if trimmed.starts_with('[') {
        if let Ok(json_val) = serde_json::from_str::<Value>(trimmed) {
            return json_val;
        }
    }
    Value::String(trimmed.to_string())
}
