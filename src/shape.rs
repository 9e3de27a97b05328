//! Shape inference and workspace sizing.
//!
//! Both the host's shape-inference pass and the execution path call
//! [`output_length`], so the declared capacity and the capacity used when
//! writing results cannot drift apart.

use crate::geometry::BoxFormat;
use crate::params::NmsParams;
use crate::tensor::{NmsDims, BOX_COORDS};
use crate::util::math::{align_up, checked_product};
use crate::util::{NmsError, NmsResult};

/// Number of i32 fields per selected index.
pub const TRIPLE_LEN: usize = 3;

/// Number of sorted coordinate planes kept per pair (`y1, x1, y2, x2, area`).
pub(crate) const SORTED_PLANES: usize = 5;

fn overflow(dims: &NmsDims) -> NmsError {
    NmsError::InvalidDimensions {
        num_batches: dims.num_batches,
        num_classes: dims.num_classes,
        spatial_dimension: dims.spatial_dimension,
    }
}

/// Number of selected-index slots in the output tensor.
///
/// `batch × effective_per_class × class`, where `effective_per_class` is the
/// configured cap if positive and the box count otherwise.
pub fn output_length(dims: &NmsDims, params: &NmsParams) -> NmsResult<usize> {
    let per_class = params.effective_per_class(dims.spatial_dimension);
    checked_product(&[dims.num_batches, per_class, dims.num_classes]).ok_or_else(|| overflow(dims))
}

/// Number of i32 elements in the flat output buffer.
pub fn output_buffer_len(dims: &NmsDims, params: &NmsParams) -> NmsResult<usize> {
    output_length(dims, params)?
        .checked_mul(TRIPLE_LEN)
        .ok_or_else(|| overflow(dims))
}

/// Output tensor dimensions `[output_length, 3]`.
pub fn output_dims(dims: &NmsDims, params: &NmsParams) -> NmsResult<[usize; 2]> {
    Ok([output_length(dims, params)?, TRIPLE_LEN])
}

/// Element counts of every scratch region used during execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Decoded corner-form boxes; only needed for center-form input.
    pub corners_len: usize,
    /// Per-pair candidate order (`u32` box indices).
    pub order_len: usize,
    /// Per-pair sorted coordinate planes.
    pub planes_len: usize,
    /// Per-pair alive markers (one byte each).
    pub alive_len: usize,
    /// Per-pair staged selections (`u32` box indices), one per output slot.
    pub staged_len: usize,
    /// Per-pair selection counts (`u32`).
    pub counts_len: usize,
    /// Size in bytes of one box coordinate.
    pub box_word_size: usize,
}

impl WorkspaceLayout {
    /// Computes the layout for one execution.
    pub fn new(
        dims: &NmsDims,
        box_word_size: usize,
        box_format: BoxFormat,
        output_length: usize,
    ) -> NmsResult<Self> {
        let pairs = dims.num_pairs();
        let corners_len = match box_format {
            BoxFormat::Corners => 0,
            BoxFormat::CenterSize => {
                checked_product(&[dims.num_batches, dims.spatial_dimension, BOX_COORDS])
                    .ok_or_else(|| overflow(dims))?
            }
        };
        let order_len =
            checked_product(&[pairs, dims.spatial_dimension]).ok_or_else(|| overflow(dims))?;
        let planes_len =
            checked_product(&[order_len, SORTED_PLANES]).ok_or_else(|| overflow(dims))?;
        Ok(Self {
            corners_len,
            order_len,
            planes_len,
            alive_len: order_len,
            staged_len: output_length,
            counts_len: pairs,
            box_word_size,
        })
    }

    /// Total size in bytes, each region aligned to 16 bytes.
    pub fn total_bytes(&self) -> usize {
        let u32_size = std::mem::size_of::<u32>();
        [
            self.corners_len * self.box_word_size,
            self.order_len * u32_size,
            self.planes_len * self.box_word_size,
            self.alive_len,
            self.staged_len * u32_size,
            self.counts_len * u32_size,
        ]
        .into_iter()
        .map(align_up)
        .sum()
    }
}

/// Scratch bytes the host must provide for one execution.
///
/// `center_point_box` is the host's integer flag; non-zero requests center
/// form decoding space.
pub fn workspace_size(
    dims: &NmsDims,
    box_word_size: usize,
    center_point_box: i32,
    output_length: usize,
) -> NmsResult<usize> {
    let layout = WorkspaceLayout::new(
        dims,
        box_word_size,
        BoxFormat::from_flag(center_point_box),
        output_length,
    )?;
    Ok(layout.total_bytes())
}
