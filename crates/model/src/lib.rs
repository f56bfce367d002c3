pub mod block;
pub mod config;
pub mod error;
pub mod inputs;
pub mod model;
pub mod partition;
pub mod plan;

pub use block::{ClusterLayer, EmhsLayer};
pub use config::{EmhsModelConfig, GridSpec, ResolvedModelConfig};
pub use error::{ConfigurationError, ModelError};
pub use inputs::{batch_size, ClusterContext, Inputs};
pub use model::EmhsModel;
pub use partition::LayerPartition;
pub use plan::{layer_specs, LayerSpec};
