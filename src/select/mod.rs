//! Batched, per-class non-maximum suppression.
//!
//! [`NmsSelector`] runs greedy NMS independently for every
//! `(batch, class)` pair and assembles the survivors into a fixed-capacity
//! buffer of `(batch_index, class_index, box_index)` triples. Valid triples
//! form a prefix in batch, class, selection order; the remaining slots hold
//! [`SENTINEL`] in every field.

pub(crate) mod pair;
mod workspace;

pub use workspace::Workspace;

use crate::geometry::BoxFormat;
use crate::params::NmsParams;
use crate::shape::{output_buffer_len, output_length, WorkspaceLayout, TRIPLE_LEN};
use crate::tensor::{BoxesView, NmsDims, ScoresView};
use crate::trace::{trace_event, trace_span};
use crate::util::{NmsError, NmsResult};
use pair::{select_pairs, PairBuffers};
use workspace::{decode_center_boxes, WorkspaceParts};

#[cfg(feature = "rayon")]
use crate::kernel::rayon::select_pairs_par;

// Suppression kernel - use SIMD when available
#[cfg(not(feature = "simd"))]
use crate::kernel::scalar::SuppressScalar as Suppress;
#[cfg(feature = "simd")]
use crate::kernel::simd::SuppressSimd as Suppress;

/// Marker written to every field of an unused output slot.
pub const SENTINEL: i32 = -1;

/// One surviving box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectedIndex {
    pub batch_index: usize,
    pub class_index: usize,
    pub box_index: usize,
}

impl SelectedIndex {
    /// Returns the `[batch, class, box]` triple as written to the output tensor.
    pub fn to_triple(self) -> [i32; 3] {
        [
            self.batch_index as i32,
            self.class_index as i32,
            self.box_index as i32,
        ]
    }

    /// Parses a triple, returning `None` for sentinel or negative entries.
    pub fn from_triple(triple: [i32; 3]) -> Option<Self> {
        if triple.iter().any(|&field| field < 0) {
            return None;
        }
        Some(Self {
            batch_index: triple[0] as usize,
            class_index: triple[1] as usize,
            box_index: triple[2] as usize,
        })
    }
}

/// Selected indices together with the declared output capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    indices: Vec<SelectedIndex>,
    capacity: usize,
}

impl Selection {
    /// Reads the valid prefix of a flat output buffer.
    ///
    /// Scanning stops at the first slot that does not hold a valid triple.
    pub fn from_output_buffer(buffer: &[i32]) -> Self {
        let indices = buffer
            .chunks_exact(TRIPLE_LEN)
            .map_while(|slot| SelectedIndex::from_triple([slot[0], slot[1], slot[2]]))
            .collect();
        Self {
            indices,
            capacity: buffer.len() / TRIPLE_LEN,
        }
    }

    /// Selected indices in canonical order.
    pub fn indices(&self) -> &[SelectedIndex] {
        &self.indices
    }

    /// Number of selected boxes.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Declared number of output slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Box indices selected for one `(batch, class)` pair, in selection order.
    pub fn boxes_for(&self, batch_index: usize, class_index: usize) -> Vec<usize> {
        self.indices
            .iter()
            .filter(|sel| sel.batch_index == batch_index && sel.class_index == class_index)
            .map(|sel| sel.box_index)
            .collect()
    }

    /// Flat `[capacity, 3]` buffer padded with [`SENTINEL`].
    pub fn to_output_buffer(&self) -> Vec<i32> {
        let mut out = vec![SENTINEL; self.capacity * TRIPLE_LEN];
        for (slot, sel) in out.chunks_exact_mut(TRIPLE_LEN).zip(&self.indices) {
            slot.copy_from_slice(&sel.to_triple());
        }
        out
    }

    /// Consumes the selection, returning its indices.
    pub fn into_indices(self) -> Vec<SelectedIndex> {
        self.indices
    }
}

/// Greedy per-class NMS over batched boxes and scores.
#[derive(Clone, Debug)]
pub struct NmsSelector {
    params: NmsParams,
    parallel: bool,
}

impl NmsSelector {
    /// Creates a selector with fixed parameters.
    pub fn new(params: NmsParams) -> Self {
        Self {
            params,
            parallel: false,
        }
    }

    /// Runs `(batch, class)` pairs on the rayon pool when the `rayon` feature is enabled.
    ///
    /// Without the feature this setting is ignored. Output is identical either way.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns the configured parameters.
    pub fn params(&self) -> &NmsParams {
        &self.params
    }

    /// Returns whether parallel pair scheduling was requested.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Runs selection, allocating the workspace and output buffer.
    pub fn select(&self, boxes: BoxesView<'_>, scores: ScoresView<'_>) -> NmsResult<Selection> {
        let dims = NmsDims::from_views(&boxes, &scores)?;
        let mut output = vec![SENTINEL; output_buffer_len(&dims, &self.params)?];
        let mut workspace = Workspace::new();
        let count = self.select_into(boxes, scores, &mut workspace, &mut output)?;
        let selection = Selection::from_output_buffer(&output);
        debug_assert_eq!(selection.len(), count);
        Ok(selection)
    }

    /// Runs selection into a caller-provided `[output_length, 3]` buffer.
    ///
    /// The workspace is resized as needed and its previous contents are
    /// ignored. Returns the number of valid triples written; every other slot
    /// is set to [`SENTINEL`].
    pub fn select_into(
        &self,
        boxes: BoxesView<'_>,
        scores: ScoresView<'_>,
        workspace: &mut Workspace,
        output: &mut [i32],
    ) -> NmsResult<usize> {
        let dims = NmsDims::from_views(&boxes, &scores)?;
        check_index_range(&dims)?;
        let capacity = output_length(&dims, &self.params)?;
        let inferred = output_buffer_len(&dims, &self.params)?;
        if output.len() != inferred {
            return Err(NmsError::CapacityMismatch {
                inferred,
                got: output.len(),
            });
        }

        let _span = trace_span!(
            "nms_select",
            batches = dims.num_batches,
            classes = dims.num_classes,
            spatial = dims.spatial_dimension
        )
        .entered();

        output.fill(SENTINEL);
        if dims.spatial_dimension == 0 || dims.num_pairs() == 0 {
            trace_event!("nms_selected", count = 0usize, capacity = capacity);
            return Ok(0);
        }

        let layout = WorkspaceLayout::new(
            &dims,
            std::mem::size_of::<f32>(),
            self.params.box_format,
            capacity,
        )?;
        workspace.reserve(&layout);
        let WorkspaceParts {
            corners: decoded,
            order,
            planes,
            alive,
            staged,
            counts,
        } = workspace.parts();

        let corners: &[f32] = match self.params.box_format {
            BoxFormat::Corners => boxes.as_slice(),
            BoxFormat::CenterSize => {
                decode_center_boxes(boxes.as_slice(), decoded);
                decoded
            }
        };

        let buffers = PairBuffers {
            order,
            planes,
            alive,
            staged,
            counts,
        };
        self.run_pairs(corners, scores.as_slice(), &dims, buffers);

        let count = assemble(&dims, &self.params, workspace.selections(), output);
        trace_event!("nms_selected", count = count, capacity = capacity);
        Ok(count)
    }

    #[cfg(feature = "rayon")]
    fn run_pairs(&self, corners: &[f32], scores: &[f32], dims: &NmsDims, buffers: PairBuffers<'_>) {
        if self.parallel {
            select_pairs_par::<Suppress>(corners, scores, dims, &self.params, buffers);
        } else {
            select_pairs::<Suppress>(corners, scores, dims, &self.params, buffers);
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn run_pairs(&self, corners: &[f32], scores: &[f32], dims: &NmsDims, buffers: PairBuffers<'_>) {
        select_pairs::<Suppress>(corners, scores, dims, &self.params, buffers);
    }
}

/// Runs NMS once with the given parameters.
pub fn non_max_suppression(
    boxes: BoxesView<'_>,
    scores: ScoresView<'_>,
    params: NmsParams,
) -> NmsResult<Selection> {
    NmsSelector::new(params).select(boxes, scores)
}

fn check_index_range(dims: &NmsDims) -> NmsResult<()> {
    let limit = i32::MAX as usize;
    if dims.num_batches > limit || dims.num_classes > limit || dims.spatial_dimension > limit {
        return Err(NmsError::InvalidDimensions {
            num_batches: dims.num_batches,
            num_classes: dims.num_classes,
            spatial_dimension: dims.spatial_dimension,
        });
    }
    Ok(())
}

/// Compacts staged per-pair selections into the output prefix.
fn assemble(
    dims: &NmsDims,
    params: &NmsParams,
    (staged, counts): (&[u32], &[u32]),
    output: &mut [i32],
) -> usize {
    let per_class = params.effective_per_class(dims.spatial_dimension);
    let mut slots = output.chunks_exact_mut(TRIPLE_LEN);
    let mut written = 0usize;

    for (pair, (pair_staged, &count)) in staged.chunks(per_class).zip(counts).enumerate() {
        let batch = (pair / dims.num_classes) as i32;
        let class = (pair % dims.num_classes) as i32;
        for &box_index in &pair_staged[..count as usize] {
            if let Some(slot) = slots.next() {
                slot.copy_from_slice(&[batch, class, box_index as i32]);
                written += 1;
            }
        }
    }
    written
}
