//! The NMS operator plugin and its creator.

use crate::plugin::config::{PluginConfig, SERIALIZED_LEN};
use crate::plugin::{
    DataType, DynamicPlugin, PluginCreator, PluginFieldCollection, TensorDesc, TensorFormat,
};
use crate::select::{NmsSelector, Workspace};
use crate::shape::{output_dims, workspace_size};
use crate::tensor::{BoxesView, NmsDims, ScoresView, BOX_COORDS};
use crate::trace::trace_event;
use crate::util::{NmsError, NmsResult};
use crate::NmsParams;

/// Registry name of the operator.
pub const PLUGIN_NAME: &str = "MMCVNonMaxSuppression";

/// Registry version of the operator.
pub const PLUGIN_VERSION: &str = "1";

/// Field names accepted by [`NmsPluginCreator::create_plugin`], in serialization order.
pub const FIELD_NAMES: [&str; 4] = [
    "center_point_box",
    "max_output_boxes_per_class",
    "iou_threshold",
    "score_threshold",
];

const BOXES: usize = 0;
const SCORES: usize = 1;

/// Extracts `(batch, spatial, class)` from `[batch, spatial, 4]` boxes and
/// `[batch, class, spatial]` scores dimensions.
fn dims_from_shapes(boxes: &[usize], scores: &[usize]) -> NmsResult<NmsDims> {
    let [num_batches, spatial_dimension, coords] = boxes else {
        return Err(NmsError::InvalidInput("boxes must have rank 3"));
    };
    if *coords != BOX_COORDS {
        return Err(NmsError::InvalidInput("boxes must have 4 coordinates"));
    }
    let [score_batches, num_classes, score_spatial] = scores else {
        return Err(NmsError::InvalidInput("scores must have rank 3"));
    };
    if score_batches != num_batches {
        return Err(NmsError::ShapeMismatch {
            what: "batch count",
            boxes: *num_batches,
            scores: *score_batches,
        });
    }
    if score_spatial != spatial_dimension {
        return Err(NmsError::ShapeMismatch {
            what: "spatial dimension",
            boxes: *spatial_dimension,
            scores: *score_spatial,
        });
    }
    Ok(NmsDims {
        num_batches: *num_batches,
        spatial_dimension: *spatial_dimension,
        num_classes: *num_classes,
    })
}

/// Rejects any input or output that is not the linear type the kernel reads or writes.
fn check_formats(inputs: &[TensorDesc], outputs: &[TensorDesc]) -> NmsResult<()> {
    let expected = [(BOXES, DataType::Float32), (SCORES, DataType::Float32)]
        .into_iter()
        .filter_map(|(position, data_type)| Some((position, inputs.get(position)?, data_type)))
        .chain(
            outputs
                .first()
                .map(|desc| (inputs.len(), desc, DataType::Int32)),
        );
    for (position, desc, data_type) in expected {
        if desc.data_type != data_type || desc.format != TensorFormat::Linear {
            return Err(NmsError::UnsupportedFormat { position });
        }
    }
    Ok(())
}

fn input_dims(descs: &[TensorDesc]) -> NmsResult<NmsDims> {
    match descs {
        [boxes, scores, ..] => dims_from_shapes(&boxes.dims, &scores.dims),
        _ => Err(NmsError::InvalidInput("expected boxes and scores inputs")),
    }
}

/// Configured NMS operator instance.
#[derive(Clone, Debug)]
pub struct NmsPlugin {
    layer_name: String,
    namespace: String,
    config: PluginConfig,
    selector: NmsSelector,
}

impl NmsPlugin {
    /// Creates a plugin from raw host fields.
    pub fn from_config(layer_name: &str, config: PluginConfig) -> Self {
        Self {
            layer_name: layer_name.to_owned(),
            namespace: String::new(),
            config,
            selector: NmsSelector::new(config.params()),
        }
    }

    /// Creates a plugin from selection parameters.
    pub fn new(layer_name: &str, params: NmsParams) -> NmsResult<Self> {
        Ok(Self::from_config(
            layer_name,
            PluginConfig::from_params(&params)?,
        ))
    }

    /// Enables parallel pair scheduling for execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.selector = self.selector.with_parallel(parallel);
        self
    }

    /// Name of the graph layer this instance was built for.
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Raw host fields.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Effective selection parameters.
    pub fn params(&self) -> &NmsParams {
        self.selector.params()
    }

    /// Serialized configuration as an owned array.
    pub fn to_bytes(&self) -> [u8; SERIALIZED_LEN] {
        self.config.to_bytes()
    }
}

impl DynamicPlugin for NmsPlugin {
    fn plugin_type(&self) -> &str {
        PLUGIN_NAME
    }

    fn plugin_version(&self) -> &str {
        PLUGIN_VERSION
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn output_dimensions(&self, index: usize, inputs: &[Vec<usize>]) -> NmsResult<Vec<usize>> {
        if index != 0 {
            return Err(NmsError::InvalidInput("NMS has a single output"));
        }
        let dims = match inputs {
            [boxes, scores, ..] => dims_from_shapes(boxes, scores)?,
            _ => return Err(NmsError::InvalidInput("expected boxes and scores inputs")),
        };
        Ok(output_dims(&dims, self.params())?.to_vec())
    }

    fn output_data_type(&self, _index: usize, _input_types: &[DataType]) -> DataType {
        DataType::Int32
    }

    fn supports_format_combination(
        &self,
        pos: usize,
        in_out: &[TensorDesc],
        nb_inputs: usize,
    ) -> bool {
        let Some(desc) = in_out.get(pos) else {
            return false;
        };
        let linear = desc.format == TensorFormat::Linear;
        if pos < nb_inputs {
            match pos {
                BOXES | SCORES => desc.data_type == DataType::Float32 && linear,
                _ => true,
            }
        } else {
            match pos - nb_inputs {
                0 => desc.data_type == DataType::Int32 && linear,
                _ => true,
            }
        }
    }

    fn workspace_size(&self, inputs: &[TensorDesc], outputs: &[TensorDesc]) -> NmsResult<usize> {
        let dims = input_dims(inputs)?;
        let output_length = outputs
            .first()
            .and_then(|desc| desc.dims.first().copied())
            .ok_or(NmsError::InvalidInput("missing output dimensions"))?;
        workspace_size(
            &dims,
            inputs[BOXES].data_type.size_bytes(),
            self.config.center_point_box,
            output_length,
        )
    }

    fn serialization_size(&self) -> usize {
        SERIALIZED_LEN
    }

    fn serialize(&self, buffer: &mut [u8]) -> NmsResult<()> {
        self.config.write_bytes(buffer)
    }

    fn enqueue(
        &self,
        input_desc: &[TensorDesc],
        output_desc: &[TensorDesc],
        inputs: &[&[f32]],
        output: &mut [i32],
        workspace: &mut Workspace,
    ) -> NmsResult<usize> {
        let dims = input_dims(input_desc)?;
        check_formats(input_desc, output_desc)?;
        let declared = output_desc
            .first()
            .and_then(|desc| desc.dims.first().copied())
            .ok_or(NmsError::InvalidInput("missing output dimensions"))?;
        let inferred = output_dims(&dims, self.params())?[0];
        if declared != inferred {
            return Err(NmsError::CapacityMismatch {
                inferred,
                got: declared,
            });
        }
        let [boxes, scores, ..] = inputs else {
            return Err(NmsError::InvalidInput("expected boxes and scores inputs"));
        };

        let boxes = BoxesView::new(boxes, dims.num_batches, dims.spatial_dimension)?;
        let scores = ScoresView::new(
            scores,
            dims.num_batches,
            dims.num_classes,
            dims.spatial_dimension,
        )?;
        let count = self
            .selector
            .select_into(boxes, scores, workspace, output)?;
        trace_event!("plugin_enqueue", selected = count, output_length = declared);
        Ok(count)
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn set_namespace(&mut self, namespace: &str) {
        namespace.clone_into(&mut self.namespace);
    }
}

/// Creator registered with the host under [`PLUGIN_NAME`].
#[derive(Clone, Debug, Default)]
pub struct NmsPluginCreator {
    namespace: String,
}

impl NmsPluginCreator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PluginCreator for NmsPluginCreator {
    type Plugin = NmsPlugin;

    fn plugin_name(&self) -> &str {
        PLUGIN_NAME
    }

    fn plugin_version(&self) -> &str {
        PLUGIN_VERSION
    }

    fn field_names(&self) -> &'static [&'static str] {
        &FIELD_NAMES
    }

    fn create_plugin(&self, name: &str, fields: &PluginFieldCollection) -> NmsResult<NmsPlugin> {
        let config = PluginConfig::from_fields(fields)?;
        let mut plugin = NmsPlugin::from_config(name, config);
        plugin.set_namespace(&self.namespace);
        Ok(plugin)
    }

    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> NmsResult<NmsPlugin> {
        let config = PluginConfig::from_bytes(data)?;
        let mut plugin = NmsPlugin::from_config(name, config);
        plugin.set_namespace(&self.namespace);
        Ok(plugin)
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn set_namespace(&mut self, namespace: &str) {
        namespace.clone_into(&mut self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::{check_formats, dims_from_shapes, NmsPlugin, NmsPluginCreator};
    use crate::plugin::{
        DataType, DynamicPlugin, PluginCreator, PluginFieldCollection, TensorDesc, TensorFormat,
    };
    use crate::util::NmsError;

    #[test]
    fn shapes_must_agree() {
        let err = dims_from_shapes(&[1, 10, 4], &[1, 3, 9]).unwrap_err();
        assert_eq!(
            err,
            NmsError::ShapeMismatch {
                what: "spatial dimension",
                boxes: 10,
                scores: 9,
            }
        );
        assert!(dims_from_shapes(&[1, 10, 5], &[1, 3, 10]).is_err());
        assert!(dims_from_shapes(&[1, 10], &[1, 3, 10]).is_err());
    }

    #[test]
    fn creator_propagates_namespace() {
        let mut creator = NmsPluginCreator::new();
        creator.set_namespace("detection");
        let plugin: NmsPlugin = creator
            .create_plugin("nms_0", &PluginFieldCollection::new())
            .unwrap();
        assert_eq!(plugin.namespace(), "detection");
        assert_eq!(plugin.layer_name(), "nms_0");

        let restored = creator
            .deserialize_plugin("nms_1", &plugin.to_bytes())
            .unwrap();
        assert_eq!(restored.namespace(), "detection");
        assert_eq!(restored.config(), plugin.config());
    }

    #[test]
    fn execution_rejects_non_linear_or_mistyped_tensors() {
        let boxes = TensorDesc::linear(vec![1, 3, 4], DataType::Float32);
        let scores = TensorDesc::linear(vec![1, 1, 3], DataType::Float32);
        let output = TensorDesc::linear(vec![3, 3], DataType::Int32);
        assert!(check_formats(&[boxes.clone(), scores.clone()], &[output.clone()]).is_ok());

        let mut packed = scores.clone();
        packed.format = TensorFormat::Chw32;
        assert_eq!(
            check_formats(&[boxes.clone(), packed], &[output]),
            Err(NmsError::UnsupportedFormat { position: 1 })
        );

        let float_output = TensorDesc::linear(vec![3, 3], DataType::Float32);
        assert_eq!(
            check_formats(&[boxes, scores], &[float_output]),
            Err(NmsError::UnsupportedFormat { position: 2 })
        );
    }
}
