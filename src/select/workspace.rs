//! Reusable scratch memory for selection.

use crate::geometry::{BoxFormat, Corners};
use crate::shape::WorkspaceLayout;
use crate::tensor::BOX_COORDS;

/// Scratch buffers sized from a [`WorkspaceLayout`].
///
/// A workspace can be reused across calls and across shapes; contents are
/// never assumed to survive from one call to the next.
#[derive(Debug, Default)]
pub struct Workspace {
    corners: Vec<f32>,
    order: Vec<u32>,
    planes: Vec<f32>,
    alive: Vec<bool>,
    staged: Vec<u32>,
    counts: Vec<u32>,
}

/// Disjoint mutable borrows of every workspace region.
pub(crate) struct WorkspaceParts<'a> {
    pub corners: &'a mut [f32],
    pub order: &'a mut [u32],
    pub planes: &'a mut [f32],
    pub alive: &'a mut [bool],
    pub staged: &'a mut [u32],
    pub counts: &'a mut [u32],
}

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a workspace already sized for `layout`.
    pub fn with_layout(layout: &WorkspaceLayout) -> Self {
        let mut workspace = Self::new();
        workspace.reserve(layout);
        workspace
    }

    /// Resizes every region to the element counts of `layout`.
    pub fn reserve(&mut self, layout: &WorkspaceLayout) {
        self.corners.resize(layout.corners_len, 0.0);
        self.order.resize(layout.order_len, 0);
        self.planes.resize(layout.planes_len, 0.0);
        self.alive.resize(layout.alive_len, false);
        self.staged.resize(layout.staged_len, 0);
        self.counts.resize(layout.counts_len, 0);
    }

    /// Bytes currently held, using the same per-region alignment as the layout.
    pub fn size_bytes(&self) -> usize {
        WorkspaceLayout {
            corners_len: self.corners.len(),
            order_len: self.order.len(),
            planes_len: self.planes.len(),
            alive_len: self.alive.len(),
            staged_len: self.staged.len(),
            counts_len: self.counts.len(),
            box_word_size: std::mem::size_of::<f32>(),
        }
        .total_bytes()
    }

    /// Staged per-pair selections and their counts from the last call.
    pub(crate) fn selections(&self) -> (&[u32], &[u32]) {
        (&self.staged, &self.counts)
    }

    pub(crate) fn parts(&mut self) -> WorkspaceParts<'_> {
        WorkspaceParts {
            corners: &mut self.corners,
            order: &mut self.order,
            planes: &mut self.planes,
            alive: &mut self.alive,
            staged: &mut self.staged,
            counts: &mut self.counts,
        }
    }
}

/// Decodes center-form boxes into corner-form `[y1, x1, y2, x2]` quadruples.
pub(crate) fn decode_center_boxes(raw: &[f32], out: &mut [f32]) {
    for (src, dst) in raw
        .chunks_exact(BOX_COORDS)
        .zip(out.chunks_exact_mut(BOX_COORDS))
    {
        let c = Corners::decode([src[0], src[1], src[2], src[3]], BoxFormat::CenterSize);
        dst.copy_from_slice(&[c.y1, c.x1, c.y2, c.x2]);
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_center_boxes, Workspace};
    use crate::geometry::BoxFormat;
    use crate::shape::WorkspaceLayout;
    use crate::tensor::NmsDims;

    #[test]
    fn reserved_size_matches_layout() {
        let dims = NmsDims {
            num_batches: 2,
            spatial_dimension: 13,
            num_classes: 3,
        };
        for format in [BoxFormat::Corners, BoxFormat::CenterSize] {
            let layout = WorkspaceLayout::new(&dims, 4, format, 78).unwrap();
            let workspace = Workspace::with_layout(&layout);
            assert_eq!(workspace.size_bytes(), layout.total_bytes());
        }
    }

    #[test]
    fn reserve_shrinks_for_smaller_shapes() {
        let big = NmsDims {
            num_batches: 4,
            spatial_dimension: 50,
            num_classes: 4,
        };
        let small = NmsDims {
            num_batches: 1,
            spatial_dimension: 2,
            num_classes: 1,
        };
        let big_layout = WorkspaceLayout::new(&big, 4, BoxFormat::Corners, 800).unwrap();
        let small_layout = WorkspaceLayout::new(&small, 4, BoxFormat::Corners, 2).unwrap();
        let mut workspace = Workspace::with_layout(&big_layout);
        workspace.reserve(&small_layout);
        assert_eq!(workspace.size_bytes(), small_layout.total_bytes());
    }

    #[test]
    fn center_boxes_decode_in_place_order() {
        let raw = [1.0f32, 2.0, 2.0, 4.0];
        let mut out = [0.0f32; 4];
        decode_center_boxes(&raw, &mut out);
        assert_eq!(out, [0.0, 0.0, 4.0, 2.0]);
    }
}
