use crate::error::Nd2Error;
use crate::metadata::lite_variant::decode_record;

const RECORD : &str = "SLxImageTextInfo";

/// Free-text annotations attached to a file. Every field is
/// optional in the format and is left empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInfo {
    pub image_id : String,
    pub image_type : String,
    pub group : String,
    pub sample_id : String,
    pub author : String,
    pub description : String,
    pub capturing : String,
    pub sampling : String,
    pub location : String,
    pub date : String,
    pub conclusion : String,
    pub info1 : String,
    pub info2 : String,
    pub optics : String,
    pub app_version : String,
}

impl TextInfo {
    /// Decodes the payload of the text info chunk. Items are
    /// numbered `TextInfoItem_<n>`, in field order.
    pub (crate) fn decode(data : &[u8]) -> Result<Self, Nd2Error> {
        let record = decode_record(data, RECORD)?;
        let mut info = TextInfo::default();
        {
            let fields : [&mut String; 15] = [
                &mut info.image_id,
                &mut info.image_type,
                &mut info.group,
                &mut info.sample_id,
                &mut info.author,
                &mut info.description,
                &mut info.capturing,
                &mut info.sampling,
                &mut info.location,
                &mut info.date,
                &mut info.conclusion,
                &mut info.info1,
                &mut info.info2,
                &mut info.optics,
                &mut info.app_version,
            ];
            for (n, field) in fields.into_iter().enumerate() {
                if let Some(text) = record.string(&format!("TextInfoItem_{}", n)) {
                    *field = text.to_string();
                }
            }
        }
        Ok(info)
    }

    /// `true` if no field holds any text
    pub fn is_empty(&self) -> bool {
        *self == TextInfo::default()
    }
}
