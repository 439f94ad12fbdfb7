use crate::error::Nd2Error;
use crate::metadata::lite_variant::decode_record;

const RECORD : &str = "BinaryMetadata_v1";

/// The format stores at most this many binary layers
pub const MAX_BINARY_LAYERS : usize = 128;

/// Describes one binary (mask) layer. Only the description
/// is decoded; the mask planes themselves are not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryLayerDescriptor {
    pub name : String,
    /// Component the layer is bound to, empty if unbound
    pub bound_component_name : String,
    pub color_rgb : u32,
}

impl BinaryLayerDescriptor {
    /// Decodes every layer listed in the binary metadata chunk
    pub (crate) fn decode_all(data : &[u8]) -> Result<Vec<Self>, Nd2Error> {
        let record = decode_record(data, RECORD)?;
        let count = record.levels().count();
        if count > MAX_BINARY_LAYERS {
            return Err(Nd2Error::FormatError(format!(
                "{} binary layers, at most {} allowed", count, MAX_BINARY_LAYERS
            )));
        }

        Ok(record.levels().map(|(_, layer)| BinaryLayerDescriptor {
            name : layer.string("Name").unwrap_or_default().to_string(),
            bound_component_name : layer.string("CompName").unwrap_or_default().to_string(),
            color_rgb : layer.u32("Color").unwrap_or(0),
        }).collect())
    }

    pub fn is_bound(&self) -> bool {
        !self.bound_component_name.is_empty()
    }
}
