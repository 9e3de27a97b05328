//! Scalar reference suppression kernel.

use crate::geometry::iou_with_areas;
use crate::kernel::{SortedBoxes, SuppressKernel};

/// One-box-at-a-time suppression sweep.
pub struct SuppressScalar;

impl SuppressKernel for SuppressScalar {
    fn suppress(boxes: &SortedBoxes<'_>, pivot: usize, alive: &mut [bool], iou_threshold: f32) {
        let pivot_area = boxes.area[pivot];
        if pivot_area <= 0.0 {
            return;
        }
        let pivot_box = boxes.corners(pivot);

        for rank in pivot + 1..boxes.len() {
            if !alive[rank] {
                continue;
            }
            let area = boxes.area[rank];
            if area <= 0.0 {
                continue;
            }
            let overlap = iou_with_areas(&pivot_box, pivot_area, &boxes.corners(rank), area);
            if overlap > iou_threshold {
                alive[rank] = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SuppressScalar;
    use crate::kernel::{SortedBoxes, SuppressKernel};

    // Planes for three boxes: [0,0,10,10], [0,1,10,11], [0,20,10,30].
    const PLANES: [f32; 15] = [
        0.0, 0.0, 0.0, // y1
        0.0, 1.0, 20.0, // x1
        10.0, 10.0, 10.0, // y2
        10.0, 11.0, 30.0, // x2
        100.0, 100.0, 100.0, // area
    ];

    #[test]
    fn suppresses_only_overlapping_followers() {
        let boxes = SortedBoxes::from_planes(&PLANES, 3, 3).unwrap();
        let mut alive = [true; 3];
        SuppressScalar::suppress(&boxes, 0, &mut alive, 0.5);
        assert_eq!(alive, [true, false, true]);
    }

    #[test]
    fn threshold_of_one_never_suppresses() {
        let boxes = SortedBoxes::from_planes(&PLANES, 3, 3).unwrap();
        let mut alive = [true; 3];
        SuppressScalar::suppress(&boxes, 0, &mut alive, 1.0);
        assert_eq!(alive, [true; 3]);
    }

    #[test]
    fn degenerate_pivot_suppresses_nothing() {
        let mut planes = PLANES;
        planes[12] = 0.0;
        let boxes = SortedBoxes::from_planes(&planes, 3, 3).unwrap();
        let mut alive = [true; 3];
        SuppressScalar::suppress(&boxes, 0, &mut alive, -1.0);
        assert_eq!(alive, [true; 3]);
    }

    #[test]
    fn from_planes_rejects_short_buffers() {
        assert!(SortedBoxes::from_planes(&PLANES, 4, 3).is_none());
        assert!(SortedBoxes::from_planes(&PLANES, 3, 4).is_none());
    }

    #[test]
    fn from_planes_rejects_overflowing_stride() {
        assert!(SortedBoxes::from_planes(&[0.0; 5], usize::MAX / 4, 0).is_none());
    }
}
