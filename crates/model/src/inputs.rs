use candle_core::{Result, Tensor};
use layers::cluster;

/// Owned bundle of the tensors consumed by one forward call.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Point features, `[points, input_nc]`.
    pub x: Tensor,
    /// Dense re-indexing of `cluster_non_consecutive` into `[0, clusters)`.
    pub consecutive_cluster: Tensor,
    /// Original (sparse) cluster id of every point.
    pub cluster_non_consecutive: Tensor,
    /// Sample id of every point, if the points come from several samples.
    pub batch: Option<Tensor>,
}

/// Descriptors shared unchanged by every layer during one forward call.
#[derive(Debug, Clone, Copy)]
pub struct ClusterContext<'a> {
    pub consecutive_cluster: &'a Tensor,
    pub cluster_non_consecutive: &'a Tensor,
    /// Sorted distinct values of `cluster_non_consecutive`.
    pub unique_cluster_non_consecutive: &'a Tensor,
    pub batch: Option<&'a Tensor>,
    pub batch_size: usize,
}

impl ClusterContext<'_> {
    /// Number of dense cluster ids, i.e. distinct original cluster ids.
    pub fn num_clusters(&self) -> usize {
        self.unique_cluster_non_consecutive
            .dims()
            .first()
            .copied()
            .unwrap_or(0)
    }
}

/// Number of samples in a forward call.
///
/// With `batch` present this is its number of distinct ids; otherwise every
/// row of `x` counts as its own sample.
pub fn batch_size(x: &Tensor, batch: Option<&Tensor>) -> Result<usize> {
    match batch {
        Some(batch) => cluster::count_unique(batch),
        None => x.dim(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn batch_size_falls_back_to_rows() -> Result<()> {
        let x = Tensor::zeros((7, 3), DType::F32, &Device::Cpu)?;
        assert_eq!(batch_size(&x, None)?, 7);
        Ok(())
    }

    #[test]
    fn batch_size_counts_distinct_samples() -> Result<()> {
        let device = Device::Cpu;
        let x = Tensor::zeros((5, 3), DType::F32, &device)?;
        let batch = Tensor::new(&[0i64, 0, 1, 1, 2], &device)?;
        assert_eq!(batch_size(&x, Some(&batch))?, 3);
        Ok(())
    }
}
