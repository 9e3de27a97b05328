//! Suppression kernels.
//!
//! A kernel performs the filter step of greedy NMS: given the box just
//! selected, it clears the alive marker of every lower-ranked candidate that
//! overlaps it by more than the IoU threshold. Candidates are stored as
//! structure-of-arrays planes in score order so the sweep is linear.

use crate::geometry::Corners;

/// Score-ordered candidate boxes of one `(batch, class)` pair.
#[derive(Clone, Copy, Debug)]
pub struct SortedBoxes<'a> {
    pub y1: &'a [f32],
    pub x1: &'a [f32],
    pub y2: &'a [f32],
    pub x2: &'a [f32],
    /// Precomputed areas, zero for degenerate boxes.
    pub area: &'a [f32],
}

impl<'a> SortedBoxes<'a> {
    /// Splits a planar buffer of five planes, each `stride` long, keeping `len` entries per plane.
    ///
    /// Returns `None` if the buffer is too short or `len > stride`.
    pub fn from_planes(planes: &'a [f32], stride: usize, len: usize) -> Option<Self> {
        let needed = stride.checked_mul(5)?;
        if len > stride || planes.len() < needed {
            return None;
        }
        let plane = move |idx: usize| -> &'a [f32] { &planes[idx * stride..idx * stride + len] };
        Some(Self {
            y1: plane(0),
            x1: plane(1),
            y2: plane(2),
            x2: plane(3),
            area: plane(4),
        })
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.area.len()
    }

    /// Returns `true` when there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.area.is_empty()
    }

    /// Corners of the candidate at `rank`.
    #[inline]
    pub fn corners(&self, rank: usize) -> Corners {
        Corners {
            y1: self.y1[rank],
            x1: self.x1[rank],
            y2: self.y2[rank],
            x2: self.x2[rank],
        }
    }
}

/// Filter step of greedy NMS.
pub trait SuppressKernel {
    /// Clears `alive[j]` for every `j > pivot` whose IoU with the pivot box
    /// exceeds `iou_threshold`.
    ///
    /// Degenerate boxes (zero area) never suppress and are never suppressed.
    /// `alive` must be at least `boxes.len()` long.
    fn suppress(boxes: &SortedBoxes<'_>, pivot: usize, alive: &mut [bool], iou_threshold: f32);
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;

#[cfg(feature = "rayon")]
pub(crate) mod rayon;
