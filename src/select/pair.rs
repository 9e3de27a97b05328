//! Greedy selection for a single `(batch, class)` pair.

use crate::geometry::Corners;
use crate::kernel::{SortedBoxes, SuppressKernel};
use crate::params::NmsParams;
use crate::shape::SORTED_PLANES;
use crate::tensor::{NmsDims, BOX_COORDS};
use std::cmp::Ordering;

/// Scratch slices owned by one pair for the duration of a call.
pub(crate) struct PairScratch<'a> {
    /// Candidate box indices, `spatial_dimension` long.
    pub order: &'a mut [u32],
    /// Five planes of `spatial_dimension` entries.
    pub planes: &'a mut [f32],
    /// Alive markers, `spatial_dimension` long.
    pub alive: &'a mut [bool],
    /// Selected box indices, `effective_per_class` long.
    pub staged: &'a mut [u32],
}

/// Workspace regions partitioned across all pairs.
pub(crate) struct PairBuffers<'a> {
    pub order: &'a mut [u32],
    pub planes: &'a mut [f32],
    pub alive: &'a mut [bool],
    pub staged: &'a mut [u32],
    pub counts: &'a mut [u32],
}

/// Runs greedy NMS for one pair and returns the number of staged selections.
///
/// `corners` holds the batch item's boxes in corner form (`[spatial, 4]`),
/// `scores` the pair's score row.
pub(crate) fn select_pair<K: SuppressKernel>(
    corners: &[f32],
    scores: &[f32],
    params: &NmsParams,
    scratch: PairScratch<'_>,
) -> usize {
    let spatial = scores.len();
    let cap = params.selection_cap(spatial);
    if cap == 0 {
        return 0;
    }

    let mut len = 0usize;
    for (idx, &score) in scores.iter().enumerate() {
        if score > params.score_threshold {
            scratch.order[len] = idx as u32;
            len += 1;
        }
    }
    if len == 0 {
        return 0;
    }

    let order = &mut scratch.order[..len];
    // NaN never passes the filter; -0.0 and 0.0 tie.
    order.sort_unstable_by(|&a, &b| {
        scores[b as usize]
            .partial_cmp(&scores[a as usize])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    fill_planes(corners, order, scratch.planes, spatial);
    let alive = &mut scratch.alive[..len];
    alive.fill(true);

    let Some(boxes) = SortedBoxes::from_planes(scratch.planes, spatial, len) else {
        return 0;
    };

    let mut count = 0usize;
    for pivot in 0..len {
        if !alive[pivot] {
            continue;
        }
        scratch.staged[count] = order[pivot];
        count += 1;
        if count == cap {
            break;
        }
        K::suppress(&boxes, pivot, alive, params.iou_threshold);
    }
    count
}

/// Copies candidates into score-ordered `y1, x1, y2, x2, area` planes.
fn fill_planes(corners: &[f32], order: &[u32], planes: &mut [f32], stride: usize) {
    let (y1, rest) = planes.split_at_mut(stride);
    let (x1, rest) = rest.split_at_mut(stride);
    let (y2, rest) = rest.split_at_mut(stride);
    let (x2, rest) = rest.split_at_mut(stride);
    let area = &mut rest[..stride];

    for (rank, &idx) in order.iter().enumerate() {
        let base = idx as usize * BOX_COORDS;
        let c = Corners {
            y1: corners[base],
            x1: corners[base + 1],
            y2: corners[base + 2],
            x2: corners[base + 3],
        };
        y1[rank] = c.y1;
        x1[rank] = c.x1;
        y2[rank] = c.y2;
        x2[rank] = c.x2;
        area[rank] = c.area();
    }
}

/// Runs every pair in `(batch, class)` order on the calling thread.
pub(crate) fn select_pairs<K: SuppressKernel>(
    corners: &[f32],
    scores: &[f32],
    dims: &NmsDims,
    params: &NmsParams,
    buffers: PairBuffers<'_>,
) {
    let spatial = dims.spatial_dimension;
    let per_class = params.effective_per_class(spatial);
    let batch_stride = spatial * BOX_COORDS;

    let pairs = buffers
        .order
        .chunks_mut(spatial)
        .zip(buffers.planes.chunks_mut(spatial * SORTED_PLANES))
        .zip(buffers.alive.chunks_mut(spatial))
        .zip(buffers.staged.chunks_mut(per_class))
        .zip(buffers.counts.iter_mut())
        .zip(scores.chunks(spatial));

    for (pair, (((((order, planes), alive), staged), count), row)) in pairs.enumerate() {
        let batch = pair / dims.num_classes;
        let batch_corners = &corners[batch * batch_stride..(batch + 1) * batch_stride];
        let scratch = PairScratch {
            order,
            planes,
            alive,
            staged,
        };
        *count = select_pair::<K>(batch_corners, row, params, scratch) as u32;
    }
}
