//! Host-runtime adapter.
//!
//! Inference runtimes load custom operators through a creator/plugin pair:
//! the creator builds a plugin from named fields or from a serialized blob,
//! and the plugin answers shape, format and workspace queries before it is
//! asked to execute. The traits here capture that capability set without
//! tying the selector to any particular runtime.

mod config;
mod nms;

pub use config::{PluginConfig, SERIALIZED_LEN};
pub use nms::{NmsPlugin, NmsPluginCreator, FIELD_NAMES, PLUGIN_NAME, PLUGIN_VERSION};

use crate::select::Workspace;
use crate::util::NmsResult;

/// Element types a host may propose for a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Float32,
    Float16,
    Int8,
    Int32,
    Bool,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Float16 => 2,
            Self::Int8 | Self::Bool => 1,
        }
    }
}

/// Memory layouts a host may propose for a tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorFormat {
    /// Dense row-major layout.
    Linear,
    Chw2,
    Chw4,
    Hwc8,
    Chw32,
}

/// Type, layout and concrete dimensions of one plugin input or output.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorDesc {
    pub dims: Vec<usize>,
    pub data_type: DataType,
    pub format: TensorFormat,
}

impl TensorDesc {
    /// Linear-layout descriptor.
    pub fn linear(dims: Vec<usize>, data_type: DataType) -> Self {
        Self {
            dims,
            data_type,
            format: TensorFormat::Linear,
        }
    }
}

/// Payload of a named plugin field.
#[derive(Clone, Debug, PartialEq)]
pub enum PluginFieldData {
    Int32(Vec<i32>),
    Float32(Vec<f32>),
}

/// A named construction parameter; `data` is `None` when the host left it unset.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginField {
    pub name: String,
    pub data: Option<PluginFieldData>,
}

/// Named fields passed to [`PluginCreator::create_plugin`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PluginFieldCollection {
    fields: Vec<PluginField>,
}

impl PluginFieldCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field with a single i32 value.
    pub fn with_i32(mut self, name: &str, value: i32) -> Self {
        self.push(name, Some(PluginFieldData::Int32(vec![value])));
        self
    }

    /// Adds a field with a single f32 value.
    pub fn with_f32(mut self, name: &str, value: f32) -> Self {
        self.push(name, Some(PluginFieldData::Float32(vec![value])));
        self
    }

    /// Appends a field.
    pub fn push(&mut self, name: &str, data: Option<PluginFieldData>) {
        self.fields.push(PluginField {
            name: name.to_owned(),
            data,
        });
    }

    /// Iterates over fields in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, PluginField> {
        self.fields.iter()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if the collection has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds plugins from named fields or serialized blobs.
pub trait PluginCreator {
    type Plugin: DynamicPlugin;

    /// Registry name of the operator.
    fn plugin_name(&self) -> &str;

    /// Registry version of the operator.
    fn plugin_version(&self) -> &str;

    /// Names of the fields accepted by [`create_plugin`](Self::create_plugin).
    fn field_names(&self) -> &'static [&'static str];

    /// Builds a plugin from named fields; unset fields keep their defaults.
    fn create_plugin(&self, name: &str, fields: &PluginFieldCollection)
        -> NmsResult<Self::Plugin>;

    /// Rebuilds a plugin from the bytes produced by [`DynamicPlugin::serialize`].
    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> NmsResult<Self::Plugin>;

    fn namespace(&self) -> &str;

    fn set_namespace(&mut self, namespace: &str);
}

/// A configured operator instance with dynamic input shapes.
pub trait DynamicPlugin: Clone {
    fn plugin_type(&self) -> &str;

    fn plugin_version(&self) -> &str;

    fn num_outputs(&self) -> usize;

    /// Concrete dimensions of output `index` given the input dimensions.
    fn output_dimensions(&self, index: usize, inputs: &[Vec<usize>]) -> NmsResult<Vec<usize>>;

    /// Element type of output `index`.
    fn output_data_type(&self, index: usize, input_types: &[DataType]) -> DataType;

    /// Whether the type/layout proposed at `pos` is acceptable.
    ///
    /// `in_out` lists inputs first, then outputs.
    fn supports_format_combination(&self, pos: usize, in_out: &[TensorDesc], nb_inputs: usize)
        -> bool;

    /// Scratch bytes needed to execute with the given tensors.
    fn workspace_size(&self, inputs: &[TensorDesc], outputs: &[TensorDesc]) -> NmsResult<usize>;

    fn serialization_size(&self) -> usize;

    /// Writes the configuration into `buffer`, which must hold
    /// [`serialization_size`](Self::serialization_size) bytes.
    fn serialize(&self, buffer: &mut [u8]) -> NmsResult<()>;

    /// Executes on f32 inputs, writing the i32 output. Returns the number of
    /// valid output rows.
    fn enqueue(
        &self,
        input_desc: &[TensorDesc],
        output_desc: &[TensorDesc],
        inputs: &[&[f32]],
        output: &mut [i32],
        workspace: &mut Workspace,
    ) -> NmsResult<usize>;

    fn namespace(&self) -> &str;

    fn set_namespace(&mut self, namespace: &str);
}
