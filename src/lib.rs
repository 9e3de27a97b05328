//! onnxnms implements the ONNX `NonMaxSuppression` operator for inference
//! runtimes that lack it.
//!
//! The core is a CPU selector that runs greedy, per-class NMS over batched
//! boxes and scores, with optional parallelism via the `rayon` feature and a
//! SIMD suppression kernel via the `simd` feature. The [`plugin`] module wraps
//! it in the capability set a host runtime expects from a custom-op plugin:
//! construction from named fields or a serialized blob, shape inference,
//! workspace sizing, format negotiation and execution.

pub mod geometry;
pub mod kernel;
pub mod lowlevel;
pub mod params;
pub mod plugin;
pub mod select;
pub mod shape;
pub mod tensor;
mod trace;
pub mod util;

pub use geometry::{iou, BoxFormat, Corners};
pub use params::NmsParams;
pub use plugin::{NmsPlugin, NmsPluginCreator};
pub use select::{non_max_suppression, NmsSelector, SelectedIndex, Selection, Workspace, SENTINEL};
pub use shape::{output_dims, output_length, workspace_size};
pub use tensor::{BoxesView, NmsDims, ScoresView};
pub use util::{NmsError, NmsResult};
