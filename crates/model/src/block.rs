use std::fmt;

use attention::{Attention, Config as AttentionConfig, LatentClassAttention};
use candle_core::{Error, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use layers::{activations::ActivationKind, checks, cluster};

use crate::{inputs::ClusterContext, plan::LayerSpec};

/// Call contract every layer of an EMHS network fulfils.
pub trait ClusterLayer {
    /// Maps `[points, in_channels]` features to `[points, out_channels]`.
    fn forward(&self, x: &Tensor, ctx: &ClusterContext<'_>) -> Result<Tensor>;
}

impl<L: ClusterLayer + ?Sized> ClusterLayer for Box<L> {
    fn forward(&self, x: &Tensor, ctx: &ClusterContext<'_>) -> Result<Tensor> {
        (**self).forward(x, ctx)
    }
}

/// One residual mixing step: point, cluster and sample context.
struct Element {
    point: Linear,
    cluster: Linear,
    sample: Linear,
}

impl Element {
    fn new(hidden: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            point: candle_nn::linear(hidden, hidden, vb.pp("point"))?,
            cluster: candle_nn::linear(hidden, hidden, vb.pp("cluster"))?,
            sample: candle_nn::linear(hidden, hidden, vb.pp("sample"))?,
        })
    }

    fn forward(
        &self,
        hidden: &Tensor,
        clusters: (&Tensor, usize),
        samples: (&Tensor, usize),
        activation: ActivationKind,
    ) -> Result<Tensor> {
        let (cluster_ids, num_clusters) = clusters;
        let (sample_ids, num_samples) = samples;

        let cluster_ctx = cluster::gather(
            &cluster::scatter_mean(hidden, cluster_ids, num_clusters)?,
            cluster_ids,
        )?;
        let sample_ctx = cluster::gather(
            &cluster::scatter_mean(hidden, sample_ids, num_samples)?,
            sample_ids,
        )?;

        let mixed = self
            .point
            .forward(hidden)?
            .add(&self.cluster.forward(&cluster_ctx)?)?
            .add(&self.sample.forward(&sample_ctx)?)?;
        hidden.add(&activation.apply(&mixed)?)
    }
}

/// Reference EMHS layer built from a [`LayerSpec`].
///
/// Features are projected to `hidden_channels`, refined by `num_elements`
/// residual elements that mix in cluster and sample means, optionally
/// attend to the group's latent classes, and are projected to
/// `out_channels`. Sample ids come from `batch`, or from the row index when no
/// batch is given; they are expected to lie in `[0, batch_size)`.
pub struct EmhsLayer {
    spec: LayerSpec,
    activation: ActivationKind,
    in_proj: Linear,
    elements: Vec<Element>,
    attention: Option<LatentClassAttention>,
    out_proj: Linear,
}

impl fmt::Debug for EmhsLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmhsLayer")
            .field("index", &self.spec.index)
            .field("in_channels", &self.spec.in_channels)
            .field("out_channels", &self.spec.out_channels)
            .field("elements", &self.elements.len())
            .field("attention", &self.attention)
            .finish()
    }
}

impl EmhsLayer {
    /// Allocates the layer's parameters under `vb`.
    pub fn new(spec: &LayerSpec, vb: VarBuilder) -> Result<Self> {
        let hidden = spec.hidden_channels;
        let in_proj = candle_nn::linear(spec.in_channels, hidden, vb.pp("in_proj"))?;

        let elements_vb = vb.pp("elements");
        let elements = (0..spec.num_elements)
            .map(|element| Element::new(hidden, elements_vb.pp(element.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let attention = match (spec.attention_enabled, spec.latent_class_count) {
            (true, Some(classes)) => {
                let config = AttentionConfig::new(hidden, classes, spec.attention_type);
                let attention = LatentClassAttention::new(config, vb.pp("attention"))
                    .map_err(|e| Error::Msg(e.to_string()))?;
                Some(attention)
            }
            _ => None,
        };

        let out_proj = candle_nn::linear(hidden, spec.out_channels, vb.pp("out_proj"))?;

        Ok(Self {
            spec: spec.clone(),
            activation: spec.activation,
            in_proj,
            elements,
            attention,
            out_proj,
        })
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    pub fn has_attention(&self) -> bool {
        self.attention.is_some()
    }

    pub fn voxelization(&self) -> [usize; 3] {
        self.spec.voxelization
    }

    pub fn kernel_size(&self) -> [usize; 3] {
        self.spec.kernel_size
    }
}

impl ClusterLayer for EmhsLayer {
    fn forward(&self, x: &Tensor, ctx: &ClusterContext<'_>) -> Result<Tensor> {
        checks::expect_points_channels("emhs.input", x, self.spec.in_channels)?;
        checks::expect_index("emhs.consecutive_cluster", ctx.consecutive_cluster)?;
        checks::expect_same_len("emhs.consecutive_cluster", x, ctx.consecutive_cluster)?;

        let points = x.dim(0)?;
        let sample_ids = match ctx.batch {
            Some(batch) => {
                checks::expect_same_len("emhs.batch", x, batch)?;
                batch.clone()
            }
            None => Tensor::arange(0u32, points as u32, x.device())?,
        };
        let clusters = (ctx.consecutive_cluster, ctx.num_clusters());
        let samples = (&sample_ids, ctx.batch_size);

        let mut hidden = self.in_proj.forward(x)?;
        for element in &self.elements {
            hidden = element.forward(&hidden, clusters, samples, self.activation)?;
        }

        if let Some(attention) = &self.attention {
            let mixed = attention
                .attend(&hidden, ctx.consecutive_cluster, ctx.num_clusters())
                .map_err(|e| Error::Msg(e.to_string()))?;
            hidden = hidden.add(&mixed)?;
        }

        self.out_proj.forward(&hidden)
    }
}
