//! SIMD suppression kernel using the `wide` crate.
//!
//! IoUs against the pivot are evaluated eight candidates at a time with
//! `f32x8`; the keep/drop decision stays per lane so the result is identical
//! to the scalar kernel.

use crate::geometry::iou_with_areas;
use crate::kernel::{SortedBoxes, SuppressKernel};
use wide::f32x8;

const LANES: usize = 8;

/// Load 8 f32 values into f32x8.
#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Eight-lane suppression sweep.
pub struct SuppressSimd;

impl SuppressKernel for SuppressSimd {
    fn suppress(boxes: &SortedBoxes<'_>, pivot: usize, alive: &mut [bool], iou_threshold: f32) {
        let pivot_area = boxes.area[pivot];
        if pivot_area <= 0.0 {
            return;
        }
        let pivot_box = boxes.corners(pivot);
        let len = boxes.len();

        let py1 = f32x8::splat(pivot_box.y1);
        let px1 = f32x8::splat(pivot_box.x1);
        let py2 = f32x8::splat(pivot_box.y2);
        let px2 = f32x8::splat(pivot_box.x2);
        let parea = f32x8::splat(pivot_area);

        let mut rank = pivot + 1;
        while rank + LANES <= len {
            let y1 = load_f32x8(&boxes.y1[rank..]);
            let x1 = load_f32x8(&boxes.x1[rank..]);
            let y2 = load_f32x8(&boxes.y2[rank..]);
            let x2 = load_f32x8(&boxes.x2[rank..]);
            let area = load_f32x8(&boxes.area[rank..]);

            let inter_w = (px2.min(x2) - px1.max(x1)).max(f32x8::ZERO);
            let inter_h = (py2.min(y2) - py1.max(y1)).max(f32x8::ZERO);
            let inter = inter_w * inter_h;
            let union = parea + area - inter;
            let ious = (inter / union).to_array();

            for lane in 0..LANES {
                let idx = rank + lane;
                if !alive[idx] || boxes.area[idx] <= 0.0 {
                    continue;
                }
                if ious[lane] > iou_threshold {
                    alive[idx] = false;
                }
            }
            rank += LANES;
        }

        // Scalar remainder
        while rank < len {
            let area = boxes.area[rank];
            if alive[rank] && area > 0.0 {
                let overlap = iou_with_areas(&pivot_box, pivot_area, &boxes.corners(rank), area);
                if overlap > iou_threshold {
                    alive[rank] = false;
                }
            }
            rank += 1;
        }
    }
}
