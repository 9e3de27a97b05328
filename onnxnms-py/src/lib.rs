//! Python bindings for the onnxnms non-maximum suppression operator.
//!
//! Boxes and scores are passed as contiguous float32 numpy arrays; selections
//! come back as an int32 `[output_length, 3]` array padded with -1.

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray3, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use onnxnms::{
    BoxFormat, BoxesView, NmsError, NmsParams as RustNmsParams, NmsSelector, ScoresView,
    SelectedIndex as RustSelectedIndex, Selection,
};

/// Convert an NmsError to a Python exception.
fn to_py_err(err: NmsError) -> PyErr {
    match err {
        NmsError::ShapeMismatch { .. }
        | NmsError::BufferTooSmall { .. }
        | NmsError::InvalidDimensions { .. }
        | NmsError::InvalidInput(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// One selected box as a `(batch_index, class_index, box_index)` record.
#[pyclass]
#[derive(Clone)]
pub struct SelectedIndex {
    #[pyo3(get)]
    pub batch_index: usize,
    #[pyo3(get)]
    pub class_index: usize,
    #[pyo3(get)]
    pub box_index: usize,
}

#[pymethods]
impl SelectedIndex {
    fn __repr__(&self) -> String {
        format!(
            "SelectedIndex(batch_index={}, class_index={}, box_index={})",
            self.batch_index, self.class_index, self.box_index
        )
    }
}

impl From<RustSelectedIndex> for SelectedIndex {
    fn from(s: RustSelectedIndex) -> Self {
        Self {
            batch_index: s.batch_index,
            class_index: s.class_index,
            box_index: s.box_index,
        }
    }
}

/// Selection parameters.
#[pyclass]
#[derive(Clone)]
pub struct NmsParams {
    inner: RustNmsParams,
}

#[pymethods]
impl NmsParams {
    /// Create a new NmsParams.
    ///
    /// Args:
    ///     center_point_box: 0 for [y1, x1, y2, x2] boxes, non-zero for
    ///         [x_center, y_center, width, height] (default: 0)
    ///     max_output_boxes_per_class: Per-class cap, 0 or negative for none (default: 0)
    ///     iou_threshold: Suppress overlaps strictly above this (default: 0.0)
    ///     score_threshold: Keep scores strictly above this (default: 0.0)
    #[new]
    #[pyo3(signature = (center_point_box=0, max_output_boxes_per_class=0, iou_threshold=0.0, score_threshold=0.0))]
    fn new(
        center_point_box: i32,
        max_output_boxes_per_class: i64,
        iou_threshold: f32,
        score_threshold: f32,
    ) -> PyResult<Self> {
        let max_output_boxes_per_class = usize::try_from(max_output_boxes_per_class.max(0))
            .map_err(|_| PyValueError::new_err("max_output_boxes_per_class is too large"))?;
        Ok(Self {
            inner: RustNmsParams {
                box_format: BoxFormat::from_flag(center_point_box),
                max_output_boxes_per_class,
                iou_threshold,
                score_threshold,
            },
        })
    }

    #[getter]
    fn center_point_box(&self) -> i32 {
        self.inner.box_format.as_flag()
    }

    #[getter]
    fn max_output_boxes_per_class(&self) -> usize {
        self.inner.max_output_boxes_per_class
    }

    #[getter]
    fn iou_threshold(&self) -> f32 {
        self.inner.iou_threshold
    }

    #[getter]
    fn score_threshold(&self) -> f32 {
        self.inner.score_threshold
    }

    /// Number of output rows for the given input shape.
    fn output_length(
        &self,
        num_batches: usize,
        spatial_dimension: usize,
        num_classes: usize,
    ) -> PyResult<usize> {
        let dims = onnxnms::NmsDims {
            num_batches,
            spatial_dimension,
            num_classes,
        };
        onnxnms::output_length(&dims, &self.inner).map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "NmsParams(center_point_box={}, max_output_boxes_per_class={}, iou_threshold={}, score_threshold={})",
            self.inner.box_format.as_flag(),
            self.inner.max_output_boxes_per_class,
            self.inner.iou_threshold,
            self.inner.score_threshold
        )
    }
}

fn run_selection(
    boxes: &PyReadonlyArray3<'_, f32>,
    scores: &PyReadonlyArray3<'_, f32>,
    params: RustNmsParams,
    parallel: bool,
) -> PyResult<Selection> {
    let box_shape = boxes.shape();
    let score_shape = scores.shape();
    if box_shape[2] != 4 {
        return Err(PyValueError::new_err("boxes must have shape [batch, spatial, 4]"));
    }
    let boxes_view =
        BoxesView::new(boxes.as_slice()?, box_shape[0], box_shape[1]).map_err(to_py_err)?;
    let scores_view = ScoresView::new(
        scores.as_slice()?,
        score_shape[0],
        score_shape[1],
        score_shape[2],
    )
    .map_err(to_py_err)?;
    NmsSelector::new(params)
        .with_parallel(parallel)
        .select(boxes_view, scores_view)
        .map_err(to_py_err)
}

/// Run non-maximum suppression, returning the padded output tensor.
///
/// Args:
///     boxes: 3D float32 numpy array (batch x spatial x 4)
///     scores: 3D float32 numpy array (batch x class x spatial)
///     params: NmsParams (default: NmsParams())
///     parallel: Run (batch, class) pairs in parallel (default: False)
///
/// Returns:
///     int32 numpy array of shape (output_length, 3); unused rows are -1
#[pyfunction]
#[pyo3(signature = (boxes, scores, params = None, parallel = false))]
fn non_max_suppression<'py>(
    py: Python<'py>,
    boxes: PyReadonlyArray3<'py, f32>,
    scores: PyReadonlyArray3<'py, f32>,
    params: Option<NmsParams>,
    parallel: bool,
) -> PyResult<Bound<'py, PyArray2<i32>>> {
    let params = params.map(|p| p.inner).unwrap_or_default();
    let selection = run_selection(&boxes, &scores, params, parallel)?;
    let array = Array2::from_shape_vec((selection.capacity(), 3), selection.to_output_buffer())
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
    Ok(array.into_pyarray(py))
}

/// Run non-maximum suppression, returning only the valid selections.
///
/// Args:
///     boxes: 3D float32 numpy array (batch x spatial x 4)
///     scores: 3D float32 numpy array (batch x class x spatial)
///     params: NmsParams (default: NmsParams())
///     parallel: Run (batch, class) pairs in parallel (default: False)
///
/// Returns:
///     List of SelectedIndex in batch, class, selection order
#[pyfunction]
#[pyo3(signature = (boxes, scores, params = None, parallel = false))]
fn select_indices(
    boxes: PyReadonlyArray3<'_, f32>,
    scores: PyReadonlyArray3<'_, f32>,
    params: Option<NmsParams>,
    parallel: bool,
) -> PyResult<Vec<SelectedIndex>> {
    let params = params.map(|p| p.inner).unwrap_or_default();
    let selection = run_selection(&boxes, &scores, params, parallel)?;
    Ok(selection
        .into_indices()
        .into_iter()
        .map(SelectedIndex::from)
        .collect())
}

/// Python module for onnxnms.
#[pymodule]
fn _onnxnms(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SelectedIndex>()?;
    m.add_class::<NmsParams>()?;
    m.add_function(wrap_pyfunction!(non_max_suppression, m)?)?;
    m.add_function(wrap_pyfunction!(select_indices, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("SENTINEL", onnxnms::SENTINEL)?;

    Ok(())
}
