//! Low-level building blocks for custom NMS pipelines.
//!
//! These expose the suppression kernels, sorted candidate planes and
//! workspace sizing beyond the high-level [`NmsSelector`](crate::NmsSelector)
//! API. Most users should prefer the top-level types.

pub use crate::geometry::iou_with_areas;
pub use crate::kernel::scalar::SuppressScalar;
#[cfg(feature = "simd")]
pub use crate::kernel::simd::SuppressSimd;
pub use crate::kernel::{SortedBoxes, SuppressKernel};
pub use crate::shape::{output_buffer_len, WorkspaceLayout, TRIPLE_LEN};
pub use crate::tensor::BOX_COORDS;
