/// The literal values the format uses to mark and name its
/// chunks. Passed into the parser rather than referenced as
/// globals, so a reader can be pointed at a variant of the
/// layout (or at a deliberately broken file in a test)
/// without touching any other code.
///
/// `FormatConstants::default()` holds the values written by
/// version 3 `.nd2` files.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatConstants {
    /// First four bytes of every chunk header
    pub chunk_magic : u32,
    /// Name of the chunk at byte 0 of the file
    pub file_signature : String,
    /// Footer signature. Also names the record that
    /// terminates the chunk map.
    pub chunk_map_signature : String,
    /// Name of the chunk holding the chunk map
    pub chunk_map_name : String,
    /// Final byte of every chunk name in the map
    pub name_terminator : u8,

    pub attributes : String,
    pub experiment : String,
    pub text_info : String,
    pub binary_layers : String,
    /// Per-frame picture metadata, followed by the frame number
    pub frame_metadata_prefix : String,
    /// Per-frame pixel data, followed by the frame number
    pub frame_data_prefix : String,

    /// Bytes of acquisition timestamp preceding the pixels
    /// in every frame data chunk
    pub frame_timestamp_len : u64,
}

impl Default for FormatConstants {
    fn default() -> Self {
        FormatConstants {
            chunk_magic : 0x0ABE_CEDA,
            file_signature : "ND2 FILE SIGNATURE CHUNK NAME01!".to_string(),
            chunk_map_signature : "ND2 CHUNK MAP SIGNATURE 0000001!".to_string(),
            chunk_map_name : "ND2 FILEMAP SIGNATURE NAME 0001!".to_string(),
            name_terminator : b'!',
            attributes : "ImageAttributesLV!".to_string(),
            experiment : "ImageMetadataLV!".to_string(),
            text_info : "ImageTextInfoLV!".to_string(),
            binary_layers : "CustomDataVar|BinaryMetadata_v1!".to_string(),
            frame_metadata_prefix : "ImageMetadataSeqLV|".to_string(),
            frame_data_prefix : "ImageDataSeq|".to_string(),
            frame_timestamp_len : 8,
        }
    }
}

impl FormatConstants {
    /// Name of the chunk holding the pixels of frame `seq_index`
    pub fn frame_data_chunk(&self, seq_index : u32) -> String {
        format!("{}{}{}", self.frame_data_prefix, seq_index, self.name_terminator as char)
    }

    /// Name of the chunk holding the picture metadata of frame `seq_index`
    pub fn frame_metadata_chunk(&self, seq_index : u32) -> String {
        format!("{}{}{}", self.frame_metadata_prefix, seq_index, self.name_terminator as char)
    }

    /// Size of the footer: signature followed by a `u64` offset.
    pub fn footer_len(&self) -> u64 {
        self.chunk_map_signature.len() as u64 + 8
    }
}
