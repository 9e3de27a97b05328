//! Rayon-parallel pair scheduling (feature-gated).
//!
//! Every `(batch, class)` pair owns a disjoint chunk of each workspace region
//! and of the staging area, so pairs run concurrently without locking.

use crate::kernel::SuppressKernel;
use crate::params::NmsParams;
use crate::select::pair::{select_pair, PairBuffers, PairScratch};
use crate::shape::SORTED_PLANES;
use crate::tensor::{NmsDims, BOX_COORDS};
use rayon::prelude::*;

/// Parallel counterpart of the sequential pair loop; results are identical.
pub(crate) fn select_pairs_par<K: SuppressKernel>(
    corners: &[f32],
    scores: &[f32],
    dims: &NmsDims,
    params: &NmsParams,
    buffers: PairBuffers<'_>,
) {
    let spatial = dims.spatial_dimension;
    let per_class = params.effective_per_class(spatial);
    let batch_stride = spatial * BOX_COORDS;
    let num_classes = dims.num_classes;

    buffers
        .order
        .par_chunks_mut(spatial)
        .zip(buffers.planes.par_chunks_mut(spatial * SORTED_PLANES))
        .zip(buffers.alive.par_chunks_mut(spatial))
        .zip(buffers.staged.par_chunks_mut(per_class))
        .zip(buffers.counts.par_iter_mut())
        .zip(scores.par_chunks(spatial))
        .enumerate()
        .for_each(|(pair, (((((order, planes), alive), staged), count), row))| {
            let batch = pair / num_classes;
            let batch_corners = &corners[batch * batch_stride..(batch + 1) * batch_stride];
            let scratch = PairScratch {
                order,
                planes,
                alive,
                staged,
            };
            *count = select_pair::<K>(batch_corners, row, params, scratch) as u32;
        });
}
