//! Error types for onnxnms.

use thiserror::Error;

/// Result alias for onnxnms operations.
pub type NmsResult<T> = std::result::Result<T, NmsError>;

/// Errors that can occur when configuring or executing NMS.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NmsError {
    /// A tensor dimension combination cannot be addressed.
    #[error(
        "invalid dimensions: batches={num_batches}, classes={num_classes}, spatial={spatial_dimension}"
    )]
    InvalidDimensions {
        num_batches: usize,
        num_classes: usize,
        spatial_dimension: usize,
    },
    /// A backing buffer is shorter than its declared shape requires.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// Boxes and scores disagree on a shared dimension.
    #[error("shape mismatch for {what}: boxes have {boxes}, scores have {scores}")]
    ShapeMismatch {
        what: &'static str,
        boxes: usize,
        scores: usize,
    },
    /// The output buffer length differs from the inferred capacity.
    #[error("output capacity mismatch: inferred {inferred} slots, buffer holds {got}")]
    CapacityMismatch { inferred: usize, got: usize },
    /// A serialized plugin blob ended before all fields were read.
    #[error("truncated plugin blob: needed {needed} bytes, got {got}")]
    TruncatedBlob { needed: usize, got: usize },
    /// A plugin field carried data of the wrong type or no data.
    #[error("plugin field `{name}` expects {expected}")]
    FieldType { name: String, expected: &'static str },
    /// The requested tensor type/layout is not supported at this position.
    #[error("unsupported tensor format at position {position}")]
    UnsupportedFormat { position: usize },
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
