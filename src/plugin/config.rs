//! Raw plugin configuration and its fixed-width serialized form.

use crate::geometry::BoxFormat;
use crate::params::NmsParams;
use crate::plugin::{PluginFieldCollection, PluginFieldData};
use crate::trace::trace_warn;
use crate::util::{NmsError, NmsResult};

/// Size of the serialized configuration: four 4-byte little-endian fields.
pub const SERIALIZED_LEN: usize = 16;

/// The four host-facing fields, kept exactly as supplied.
///
/// Keeping the raw integers means a deserialized plugin serializes back to
/// the same bytes even when a value is coerced for selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PluginConfig {
    pub center_point_box: i32,
    pub max_output_boxes_per_class: i32,
    pub iou_threshold: f32,
    pub score_threshold: f32,
}

impl PluginConfig {
    /// Reads the known fields from a collection; unknown and unset fields are ignored.
    pub fn from_fields(fields: &PluginFieldCollection) -> NmsResult<Self> {
        let mut cfg = Self::default();
        for field in fields.iter() {
            let Some(data) = field.data.as_ref() else {
                continue;
            };
            match field.name.as_str() {
                "center_point_box" => cfg.center_point_box = first_i32(&field.name, data)?,
                "max_output_boxes_per_class" => {
                    cfg.max_output_boxes_per_class = first_i32(&field.name, data)?
                }
                "iou_threshold" => cfg.iou_threshold = first_f32(&field.name, data)?,
                "score_threshold" => cfg.score_threshold = first_f32(&field.name, data)?,
                _ => {}
            }
        }
        Ok(cfg)
    }

    /// Parses the serialized form; bytes after the fourth field are ignored.
    pub fn from_bytes(data: &[u8]) -> NmsResult<Self> {
        let mut reader = BlobReader { data, offset: 0 };
        Ok(Self {
            center_point_box: i32::from_le_bytes(reader.take()?),
            max_output_boxes_per_class: i32::from_le_bytes(reader.take()?),
            iou_threshold: f32::from_le_bytes(reader.take()?),
            score_threshold: f32::from_le_bytes(reader.take()?),
        })
    }

    /// Writes the serialized form into the first [`SERIALIZED_LEN`] bytes of `buffer`.
    pub fn write_bytes(&self, buffer: &mut [u8]) -> NmsResult<()> {
        let got = buffer.len();
        let dst = buffer
            .get_mut(..SERIALIZED_LEN)
            .ok_or(NmsError::BufferTooSmall {
                needed: SERIALIZED_LEN,
                got,
            })?;
        dst.copy_from_slice(&self.to_bytes());
        Ok(())
    }

    /// Returns the serialized form.
    pub fn to_bytes(&self) -> [u8; SERIALIZED_LEN] {
        let mut out = [0u8; SERIALIZED_LEN];
        out[0..4].copy_from_slice(&self.center_point_box.to_le_bytes());
        out[4..8].copy_from_slice(&self.max_output_boxes_per_class.to_le_bytes());
        out[8..12].copy_from_slice(&self.iou_threshold.to_le_bytes());
        out[12..16].copy_from_slice(&self.score_threshold.to_le_bytes());
        out
    }

    /// Selection parameters; a negative per-class cap means no cap.
    pub fn params(&self) -> NmsParams {
        if self.max_output_boxes_per_class < 0 {
            trace_warn!(
                "negative_max_output_boxes",
                max_output_boxes_per_class = self.max_output_boxes_per_class
            );
        }
        NmsParams {
            box_format: BoxFormat::from_flag(self.center_point_box),
            max_output_boxes_per_class: self.max_output_boxes_per_class.max(0) as usize,
            iou_threshold: self.iou_threshold,
            score_threshold: self.score_threshold,
        }
    }

    /// Host fields for the given selection parameters.
    ///
    /// Caps that do not fit in an i32 are rejected.
    pub fn from_params(params: &NmsParams) -> NmsResult<Self> {
        let max_output_boxes_per_class = i32::try_from(params.max_output_boxes_per_class)
            .map_err(|_| NmsError::InvalidInput("max_output_boxes_per_class exceeds i32"))?;
        Ok(Self {
            center_point_box: params.box_format.as_flag(),
            max_output_boxes_per_class,
            iou_threshold: params.iou_threshold,
            score_threshold: params.score_threshold,
        })
    }
}

fn first_i32(name: &str, data: &PluginFieldData) -> NmsResult<i32> {
    match data {
        PluginFieldData::Int32(values) => values.first().copied(),
        PluginFieldData::Float32(_) => None,
    }
    .ok_or_else(|| NmsError::FieldType {
        name: name.to_owned(),
        expected: "at least one i32 value",
    })
}

fn first_f32(name: &str, data: &PluginFieldData) -> NmsResult<f32> {
    match data {
        PluginFieldData::Float32(values) => values.first().copied(),
        PluginFieldData::Int32(_) => None,
    }
    .ok_or_else(|| NmsError::FieldType {
        name: name.to_owned(),
        expected: "at least one f32 value",
    })
}

struct BlobReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl BlobReader<'_> {
    fn take(&mut self) -> NmsResult<[u8; 4]> {
        let end = self.offset + 4;
        let bytes = self
            .data
            .get(self.offset..end)
            .ok_or(NmsError::TruncatedBlob {
                needed: end,
                got: self.data.len(),
            })?;
        self.offset = end;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::{PluginConfig, SERIALIZED_LEN};
    use crate::geometry::BoxFormat;
    use crate::plugin::{PluginFieldCollection, PluginFieldData};
    use crate::util::NmsError;

    #[test]
    fn blob_layout_is_fixed_width_little_endian() {
        let cfg = PluginConfig {
            center_point_box: 1,
            max_output_boxes_per_class: 200,
            iou_threshold: 0.5,
            score_threshold: 0.25,
        };
        let bytes = cfg.to_bytes();
        assert_eq!(bytes.len(), SERIALIZED_LEN);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[200, 0, 0, 0]);
        assert_eq!(&bytes[8..12], &0.5f32.to_le_bytes());
        assert_eq!(PluginConfig::from_bytes(&bytes).unwrap(), cfg);
    }

    #[test]
    fn truncated_blob_reports_missing_field() {
        let bytes = PluginConfig::default().to_bytes();
        let err = PluginConfig::from_bytes(&bytes[..10]).unwrap_err();
        assert_eq!(err, NmsError::TruncatedBlob { needed: 12, got: 10 });
    }

    #[test]
    fn fields_override_defaults_and_skip_unset() {
        let mut fields = PluginFieldCollection::new()
            .with_i32("max_output_boxes_per_class", 7)
            .with_f32("iou_threshold", 0.6)
            .with_f32("unrelated", 3.0);
        fields.push("score_threshold", None);
        let cfg = PluginConfig::from_fields(&fields).unwrap();
        assert_eq!(cfg.center_point_box, 0);
        assert_eq!(cfg.max_output_boxes_per_class, 7);
        assert_eq!(cfg.iou_threshold, 0.6);
        assert_eq!(cfg.score_threshold, 0.0);
    }

    #[test]
    fn fields_reject_wrong_payload_type() {
        let fields = PluginFieldCollection::new().with_f32("center_point_box", 1.0);
        let err = PluginConfig::from_fields(&fields).unwrap_err();
        assert_eq!(
            err,
            NmsError::FieldType {
                name: "center_point_box".to_owned(),
                expected: "at least one i32 value",
            }
        );

        let mut fields = PluginFieldCollection::new();
        fields.push("iou_threshold", Some(PluginFieldData::Float32(Vec::new())));
        assert!(PluginConfig::from_fields(&fields).is_err());
    }

    #[test]
    fn negative_cap_maps_to_unlimited() {
        let cfg = PluginConfig {
            center_point_box: 1,
            max_output_boxes_per_class: -4,
            ..PluginConfig::default()
        };
        let params = cfg.params();
        assert_eq!(params.max_output_boxes_per_class, 0);
        assert_eq!(params.box_format, BoxFormat::CenterSize);
    }
}
