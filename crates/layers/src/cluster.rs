//! Scatter/gather primitives over per-point cluster ids.
//!
//! Point features are laid out as `(points, channels)` and every point carries
//! an integer id (cluster, sample, ...). Ids are rank-1 tensors in `u8`, `u32`
//! or `i64`. Pooling collapses features into `(segments, channels)` and
//! [`gather`] broadcasts pooled rows back to their points.
//!
//! Counting and deduplication run on the host: the id vectors are small
//! compared to the feature tensors and the results size subsequent kernels.

use std::collections::BTreeSet;

use candle_core::{DType, Error, Result, Tensor};

use crate::checks;

/// Copies an index tensor to the host as `i64` values.
pub fn index_to_vec(index: &Tensor) -> Result<Vec<i64>> {
    checks::expect_index("cluster.index", index)?;
    index.to_dtype(DType::I64)?.to_vec1::<i64>()
}

/// Sorted distinct values of `index`, returned in the same dtype and device.
pub fn unique_sorted(index: &Tensor) -> Result<Tensor> {
    let values: BTreeSet<i64> = index_to_vec(index)?.into_iter().collect();
    let len = values.len();
    let data: Vec<i64> = values.into_iter().collect();
    Tensor::from_vec(data, len, index.device())?.to_dtype(index.dtype())
}

/// Number of distinct values in `index`.
pub fn count_unique(index: &Tensor) -> Result<usize> {
    let values: BTreeSet<i64> = index_to_vec(index)?.into_iter().collect();
    Ok(values.len())
}

/// Number of points assigned to each of `segments` ids, shaped `(segments, 1)`.
///
/// Fails if any id falls outside `[0, segments)`.
pub fn segment_counts(index: &Tensor, segments: usize, dtype: DType) -> Result<Tensor> {
    let mut counts = vec![0f32; segments];
    for id in index_to_vec(index)? {
        let slot = usize::try_from(id)
            .ok()
            .filter(|slot| *slot < segments)
            .ok_or_else(|| {
                Error::Msg(format!(
                    "cluster.index: id {id} outside of [0, {segments})"
                ))
            })?;
        counts[slot] += 1.0;
    }
    Tensor::from_vec(counts, (segments, 1), index.device())?.to_dtype(dtype)
}

/// Sums point features per segment: `(points, c) -> (segments, c)`.
pub fn scatter_sum(src: &Tensor, index: &Tensor, segments: usize) -> Result<Tensor> {
    checks::expect_rank("cluster.src", src, 2)?;
    checks::expect_index("cluster.index", index)?;
    checks::expect_same_len("cluster.scatter", src, index)?;
    let (_, channels) = src.dims2()?;
    let zeros = Tensor::zeros((segments, channels), src.dtype(), src.device())?;
    zeros.index_add(index, src, 0)
}

/// Averages point features per segment. Empty segments stay at zero.
pub fn scatter_mean(src: &Tensor, index: &Tensor, segments: usize) -> Result<Tensor> {
    let summed = scatter_sum(src, index, segments)?;
    let counts = segment_counts(index, segments, src.dtype())?;
    let ones = Tensor::ones((segments, 1), src.dtype(), src.device())?;
    // Empty segments divide by one instead of zero.
    let denom = counts.maximum(&ones)?;
    summed.broadcast_div(&denom)
}

/// Broadcasts pooled rows back to points: `(segments, c) -> (points, c)`.
pub fn gather(pooled: &Tensor, index: &Tensor) -> Result<Tensor> {
    checks::expect_rank("cluster.pooled", pooled, 2)?;
    checks::expect_index("cluster.index", index)?;
    pooled.index_select(index, 0)
}
