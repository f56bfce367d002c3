use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;
use layers::cluster;

use crate::{
    block::{ClusterLayer, EmhsLayer},
    config::EmhsModelConfig,
    error::{ConfigurationError, ModelError},
    inputs::{batch_size, ClusterContext, Inputs},
    plan,
};

/// Stack of EMHS layers executed in ascending layer-index order.
///
/// The layer collection is fixed at construction. Forward calls only read
/// it, so one network can serve any number of calls.
pub struct EmhsModel<L = EmhsLayer> {
    voxelization: [usize; 3],
    layers: Vec<(usize, L)>,
}

impl EmhsModel<EmhsLayer> {
    /// Validates `config` and builds one layer per index.
    ///
    /// Layer `i` allocates its parameters under `vb.pp(i.to_string())`, so a
    /// network's variables are keyed `"0.in_proj.weight"`, `"1.in_proj.weight"`, ...
    pub fn new(config: &EmhsModelConfig, vb: VarBuilder) -> std::result::Result<Self, ModelError> {
        let resolved = config.validate()?;
        let specs = plan::layer_specs(&resolved);

        log::info!(
            "assembling EMHS network: layers={} groups={} input_nc={} output_nc={} feat_dim={} attention={} type={} activation={} voxelization={:?}",
            specs.len(),
            resolved.partition.num_groups(),
            resolved.input_nc,
            resolved.output_nc,
            resolved.feat_dim,
            resolved.use_attention,
            resolved.attention_type,
            resolved.activation,
            resolved.voxelization
        );

        let mut layers = Vec::with_capacity(specs.len());
        for spec in &specs {
            log::debug!(
                "layer {} group={} in={} out={} attention={} latent={:?}",
                spec.index,
                spec.group,
                spec.in_channels,
                spec.out_channels,
                spec.attention_enabled,
                spec.latent_class_count
            );
            let layer = EmhsLayer::new(spec, vb.pp(spec.key()))?;
            layers.push((spec.index, layer));
        }

        Ok(Self::from_layers(resolved.voxelization, layers)?)
    }
}

impl<L> EmhsModel<L> {
    /// Wraps pre-built layers; execution order follows the index, not `layers`' order.
    pub fn from_layers(
        voxelization: [usize; 3],
        layers: impl IntoIterator<Item = (usize, L)>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let mut layers: Vec<(usize, L)> = layers.into_iter().collect();
        layers.sort_by_key(|(index, _)| *index);
        if let Some(pair) = layers.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(ConfigurationError::DuplicateLayer(pair[0].0));
        }
        Ok(Self {
            voxelization,
            layers,
        })
    }

    /// Spatial voxel grid shared by every layer.
    pub fn voxelization(&self) -> [usize; 3] {
        self.voxelization
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Registration keys in execution order.
    pub fn keys(&self) -> Vec<String> {
        self.layers
            .iter()
            .map(|(index, _)| index.to_string())
            .collect()
    }

    pub fn layers(&self) -> impl Iterator<Item = (usize, &L)> + '_ {
        self.layers.iter().map(|(index, layer)| (*index, layer))
    }

    pub fn layer(&self, index: usize) -> Option<&L> {
        self.layers
            .binary_search_by_key(&index, |(idx, _)| *idx)
            .ok()
            .map(|pos| &self.layers[pos].1)
    }
}

impl<L: ClusterLayer> EmhsModel<L> {
    /// Runs `x` through every layer.
    ///
    /// `unique_cluster_non_consecutive` and `batch_size` are computed once and
    /// handed, together with the cluster and batch ids, unchanged to each
    /// layer. Layer errors propagate as-is.
    pub fn forward(
        &self,
        x: &Tensor,
        consecutive_cluster: &Tensor,
        cluster_non_consecutive: &Tensor,
        batch: Option<&Tensor>,
    ) -> Result<Tensor> {
        let unique_cluster_non_consecutive = cluster::unique_sorted(cluster_non_consecutive)?;
        let batch_size = batch_size(x, batch)?;
        let ctx = ClusterContext {
            consecutive_cluster,
            cluster_non_consecutive,
            unique_cluster_non_consecutive: &unique_cluster_non_consecutive,
            batch,
            batch_size,
        };

        let mut x = x.clone();
        for (_, layer) in &self.layers {
            x = layer.forward(&x, &ctx)?;
        }
        Ok(x)
    }

    pub fn forward_inputs(&self, inputs: &Inputs) -> Result<Tensor> {
        self.forward(
            &inputs.x,
            &inputs.consecutive_cluster,
            &inputs.cluster_non_consecutive,
            inputs.batch.as_ref(),
        )
    }
}
