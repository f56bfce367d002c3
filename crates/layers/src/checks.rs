//! Lightweight validation helpers shared across layer components.
//!
//! Every helper takes a short `context` label (for example `"emhs.input"`)
//! that is echoed in the error message so failures deep inside a layer stack
//! can be traced back to the tensor that triggered them. All routines return
//! `candle_core::Result<()>` so call sites can propagate with `?`.

use candle_core::{DType, Error, Result, Tensor};

/// Integer dtypes accepted as cluster or batch indices.
pub const INDEX_DTYPES: &[DType] = &[DType::U8, DType::U32, DType::I64];

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let dims = tensor.dims();
    if dims.len() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected rank {rank}, got shape {:?}",
            dims
        )))
    }
}

/// Validates the `(points, channels)` convention with a known channel count.
pub fn expect_points_channels(context: &str, tensor: &Tensor, channels: usize) -> Result<()> {
    match tensor.dims() {
        [_, actual] if *actual == channels => Ok(()),
        dims => Err(Error::Msg(format!(
            "{context}: expected (points, {channels}) layout, got {:?}",
            dims
        ))),
    }
}

/// Checks the leading dimension of two tensors agree.
pub fn expect_same_len(context: &str, lhs: &Tensor, rhs: &Tensor) -> Result<()> {
    let left = lhs.dims().first().copied();
    let right = rhs.dims().first().copied();
    if left == right {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: leading dimensions differ ({:?} vs {:?})",
            lhs.dims(),
            rhs.dims()
        )))
    }
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(context: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected dtype in {:?}, got {:?}",
            allowed, dtype
        )))
    }
}

/// Validates a rank-1 integer index tensor.
pub fn expect_index(context: &str, tensor: &Tensor) -> Result<()> {
    expect_rank(context, tensor, 1)?;
    expect_dtype_in(context, tensor, INDEX_DTYPES)
}
