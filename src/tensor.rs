//! Borrowed views over the linear f32 input tensors.
//!
//! Boxes are laid out as `[batch, spatial, 4]` and scores as
//! `[batch, class, spatial]`, both row-major with no padding. Views only
//! validate that the backing slice is long enough for the declared shape;
//! trailing elements are ignored.

use crate::util::math::checked_product;
use crate::util::{NmsError, NmsResult};

/// Number of coordinates per box.
pub const BOX_COORDS: usize = 4;

/// Borrowed view of a `[batch, spatial, 4]` boxes tensor.
#[derive(Copy, Clone, Debug)]
pub struct BoxesView<'a> {
    data: &'a [f32],
    num_batches: usize,
    spatial_dimension: usize,
}

impl<'a> BoxesView<'a> {
    /// Creates a view, checking that `data` covers the declared shape.
    pub fn new(data: &'a [f32], num_batches: usize, spatial_dimension: usize) -> NmsResult<Self> {
        let needed = checked_product(&[num_batches, spatial_dimension, BOX_COORDS]).ok_or(
            NmsError::InvalidDimensions {
                num_batches,
                num_classes: 0,
                spatial_dimension,
            },
        )?;
        if data.len() < needed {
            return Err(NmsError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data: &data[..needed],
            num_batches,
            spatial_dimension,
        })
    }

    /// Returns the batch count.
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Returns the number of boxes per batch item.
    pub fn spatial_dimension(&self) -> usize {
        self.spatial_dimension
    }

    /// Returns the addressed elements in row-major order.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns all boxes of one batch item as a flat `[spatial, 4]` slice.
    pub fn batch(&self, batch: usize) -> Option<&'a [f32]> {
        if batch >= self.num_batches {
            return None;
        }
        let len = self.spatial_dimension * BOX_COORDS;
        let start = batch * len;
        self.data.get(start..start + len)
    }

    /// Returns the four raw coordinates of one box.
    pub fn get(&self, batch: usize, index: usize) -> Option<[f32; 4]> {
        if index >= self.spatial_dimension {
            return None;
        }
        let coords = self.batch(batch)?;
        let start = index * BOX_COORDS;
        let raw = coords.get(start..start + BOX_COORDS)?;
        Some([raw[0], raw[1], raw[2], raw[3]])
    }
}

/// Borrowed view of a `[batch, class, spatial]` scores tensor.
#[derive(Copy, Clone, Debug)]
pub struct ScoresView<'a> {
    data: &'a [f32],
    num_batches: usize,
    num_classes: usize,
    spatial_dimension: usize,
}

impl<'a> ScoresView<'a> {
    /// Creates a view, checking that `data` covers the declared shape.
    pub fn new(
        data: &'a [f32],
        num_batches: usize,
        num_classes: usize,
        spatial_dimension: usize,
    ) -> NmsResult<Self> {
        let needed = checked_product(&[num_batches, num_classes, spatial_dimension]).ok_or(
            NmsError::InvalidDimensions {
                num_batches,
                num_classes,
                spatial_dimension,
            },
        )?;
        if data.len() < needed {
            return Err(NmsError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data: &data[..needed],
            num_batches,
            num_classes,
            spatial_dimension,
        })
    }

    /// Returns the batch count.
    pub fn num_batches(&self) -> usize {
        self.num_batches
    }

    /// Returns the class count.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the number of scored boxes per class.
    pub fn spatial_dimension(&self) -> usize {
        self.spatial_dimension
    }

    /// Returns the addressed elements in row-major order.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns the scores of every box for one `(batch, class)` pair.
    pub fn row(&self, batch: usize, class: usize) -> Option<&'a [f32]> {
        if batch >= self.num_batches || class >= self.num_classes {
            return None;
        }
        let start = (batch * self.num_classes + class) * self.spatial_dimension;
        self.data.get(start..start + self.spatial_dimension)
    }
}

/// Dimensions shared by a boxes/scores pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NmsDims {
    pub num_batches: usize,
    pub spatial_dimension: usize,
    pub num_classes: usize,
}

impl NmsDims {
    /// Derives the dimensions from a boxes/scores pair, requiring them to agree.
    pub fn from_views(boxes: &BoxesView<'_>, scores: &ScoresView<'_>) -> NmsResult<Self> {
        if boxes.num_batches() != scores.num_batches() {
            return Err(NmsError::ShapeMismatch {
                what: "batch count",
                boxes: boxes.num_batches(),
                scores: scores.num_batches(),
            });
        }
        if boxes.spatial_dimension() != scores.spatial_dimension() {
            return Err(NmsError::ShapeMismatch {
                what: "spatial dimension",
                boxes: boxes.spatial_dimension(),
                scores: scores.spatial_dimension(),
            });
        }
        Ok(Self {
            num_batches: boxes.num_batches(),
            spatial_dimension: boxes.spatial_dimension(),
            num_classes: scores.num_classes(),
        })
    }

    /// Number of independent `(batch, class)` selection units.
    pub fn num_pairs(&self) -> usize {
        self.num_batches * self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::{BoxesView, NmsDims, ScoresView};
    use crate::util::NmsError;

    #[test]
    fn boxes_view_rejects_short_buffer() {
        let data = [0.0f32; 7];
        let err = BoxesView::new(&data, 1, 2).unwrap_err();
        assert_eq!(err, NmsError::BufferTooSmall { needed: 8, got: 7 });
    }

    #[test]
    fn boxes_view_addresses_boxes_per_batch() {
        let data: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let view = BoxesView::new(&data, 2, 2).unwrap();
        assert_eq!(view.get(1, 0), Some([8.0, 9.0, 10.0, 11.0]));
        assert_eq!(view.get(0, 2), None);
        assert_eq!(view.batch(1).unwrap().len(), 8);
        assert!(view.batch(2).is_none());
    }

    #[test]
    fn scores_view_rows_follow_batch_then_class() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let view = ScoresView::new(&data, 2, 2, 3).unwrap();
        assert_eq!(view.row(0, 1).unwrap(), &[3.0, 4.0, 5.0]);
        assert_eq!(view.row(1, 0).unwrap(), &[6.0, 7.0, 8.0]);
        assert!(view.row(0, 2).is_none());
    }

    #[test]
    fn dims_require_matching_batches() {
        let boxes = [0.0f32; 8];
        let scores = [0.0f32; 4];
        let boxes = BoxesView::new(&boxes, 2, 1).unwrap();
        let scores = ScoresView::new(&scores, 1, 4, 1).unwrap();
        let err = NmsDims::from_views(&boxes, &scores).unwrap_err();
        assert_eq!(
            err,
            NmsError::ShapeMismatch {
                what: "batch count",
                boxes: 2,
                scores: 1,
            }
        );
    }

    #[test]
    fn empty_spatial_dimension_is_valid() {
        let boxes = BoxesView::new(&[], 3, 0).unwrap();
        let scores = ScoresView::new(&[], 3, 5, 0).unwrap();
        let dims = NmsDims::from_views(&boxes, &scores).unwrap();
        assert_eq!(dims.num_pairs(), 15);
        assert_eq!(dims.spatial_dimension, 0);
    }
}
