//! Selection parameters fixed at construction time.

use crate::geometry::BoxFormat;

/// Immutable NMS configuration shared by every `(batch, class)` pair.
///
/// Thresholds are used as given: an `iou_threshold` of 1 or more never
/// suppresses, and any real `score_threshold` is a strict lower bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsParams {
    /// Coordinate convention of the boxes tensor.
    pub box_format: BoxFormat,
    /// Per-class selection cap; 0 means no cap beyond the box count.
    pub max_output_boxes_per_class: usize,
    /// Candidates overlapping a selected box by more than this are dropped.
    pub iou_threshold: f32,
    /// Only scores strictly greater than this are considered.
    pub score_threshold: f32,
}

impl Default for NmsParams {
    fn default() -> Self {
        Self {
            box_format: BoxFormat::Corners,
            max_output_boxes_per_class: 0,
            iou_threshold: 0.0,
            score_threshold: 0.0,
        }
    }
}

impl NmsParams {
    /// Output slots reserved per `(batch, class)` pair.
    ///
    /// This is the declared capacity, which may exceed `spatial_dimension`
    /// when an explicit cap larger than the box count is configured.
    pub fn effective_per_class(&self, spatial_dimension: usize) -> usize {
        if self.max_output_boxes_per_class > 0 {
            self.max_output_boxes_per_class
        } else {
            spatial_dimension
        }
    }

    /// Upper bound on the number of selections a single pair can produce.
    pub fn selection_cap(&self, spatial_dimension: usize) -> usize {
        self.effective_per_class(spatial_dimension)
            .min(spatial_dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::NmsParams;

    #[test]
    fn zero_cap_falls_back_to_spatial_dimension() {
        let params = NmsParams::default();
        assert_eq!(params.effective_per_class(7), 7);
        assert_eq!(params.selection_cap(7), 7);
    }

    #[test]
    fn explicit_cap_is_reserved_even_beyond_box_count() {
        let params = NmsParams {
            max_output_boxes_per_class: 10,
            ..NmsParams::default()
        };
        assert_eq!(params.effective_per_class(4), 10);
        assert_eq!(params.selection_cap(4), 4);
        assert_eq!(params.selection_cap(25), 10);
    }
}
