//! Writes small, fully synthetic `.nd2` containers for the
//! tests and benchmarks. Only uses `std` and `flate2` so the
//! same file can be compiled into the library's unit tests
//! and into the integration test crate.
#![allow(dead_code)]

use std::io::Write;

use flate2::{write::ZlibEncoder, Compression};

pub const CHUNK_MAGIC : u32 = 0x0ABE_CEDA;
pub const FILE_SIGNATURE : &str = "ND2 FILE SIGNATURE CHUNK NAME01!";
pub const CHUNK_MAP_SIGNATURE : &str = "ND2 CHUNK MAP SIGNATURE 0000001!";
pub const CHUNK_MAP_NAME : &str = "ND2 FILEMAP SIGNATURE NAME 0001!";

/// Loop type tags as they appear in the experiment record
pub const LOOP_TIME : u32 = 1;
pub const LOOP_XY : u32 = 2;
pub const LOOP_Z : u32 = 4;
pub const LOOP_CUSTOM : u32 = 7;
pub const LOOP_NETIME : u32 = 8;

pub const COMPRESSION_LOSSLESS : u32 = 0;
pub const COMPRESSION_LOSSY : u32 = 1;
pub const COMPRESSION_NONE : u32 = 2;

/// A value in the lite-variant metadata encoding
#[derive(Debug, Clone)]
pub enum Lv {
    U8(u8),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Level(Vec<(String, Lv)>),
    /// An item with an arbitrary type tag and raw value bytes
    Raw(u8, Vec<u8>),
}

impl Lv {
    pub fn level(items : Vec<(&str, Lv)>) -> Lv {
        Lv::Level(items.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn str(s : &str) -> Lv {
        Lv::Str(s.to_string())
    }
}

fn utf16z(s : &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

/// Encodes one named item, including nested levels
pub fn encode_lv(name : &str, value : &Lv) -> Vec<u8> {
    let name_units = name.encode_utf16().count() + 1;
    let mut out = vec![];
    let type_tag = match value {
        Lv::U8(_) => 1,
        Lv::I32(_) => 2,
        Lv::U32(_) => 3,
        Lv::I64(_) => 4,
        Lv::U64(_) => 5,
        Lv::F64(_) => 6,
        Lv::Str(_) => 8,
        Lv::Bytes(_) => 9,
        Lv::Level(_) => 11,
        Lv::Raw(tag, _) => *tag,
    };
    out.push(type_tag);
    out.push(name_units as u8);
    out.extend(utf16z(name));

    match value {
        Lv::U8(v) => out.push(*v),
        Lv::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Lv::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Lv::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Lv::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Lv::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Lv::Str(s) => out.extend(utf16z(s)),
        Lv::Bytes(b) => {
            out.extend_from_slice(&(b.len() as u64).to_le_bytes());
            out.extend_from_slice(b);
        },
        Lv::Raw(_, b) => out.extend_from_slice(b),
        Lv::Level(items) => {
            let mut nested = vec![];
            let mut offsets = vec![];
            for (child_name, child) in items {
                offsets.push(nested.len() as u64);
                nested.extend(encode_lv(child_name, child));
            }
            // length runs from the start of this item to the
            // end of the nested items
            let length = out.len() + 12 + nested.len();
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            out.extend_from_slice(&(length as u64).to_le_bytes());
            out.extend(nested);
            for offset in offsets {
                out.extend_from_slice(&offset.to_le_bytes());
            }
        },
    }
    out
}

/// Appends chunks one after another and finishes the file
/// with a chunk map and footer.
pub struct ContainerBuilder {
    bytes : Vec<u8>,
    map : Vec<(String, u64, u64)>,
    terminate_map : bool,
}

impl ContainerBuilder {
    /// Starts a file with the version 3 signature chunk
    pub fn new() -> Self {
        let mut builder = ContainerBuilder {
            bytes : vec![],
            map : vec![],
            terminate_map : true,
        };
        builder.write_chunk(FILE_SIGNATURE, b"Ver3.0");
        builder
    }

    fn write_chunk(&mut self, name : &str, data : &[u8]) -> (u64, u64) {
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(&CHUNK_MAGIC.to_le_bytes());
        self.bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(&(data.len() as u64).to_le_bytes());
        self.bytes.extend_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(data);
        (offset, self.bytes.len() as u64 - offset)
    }

    /// Appends a chunk and lists it in the map. Returns the
    /// position of its record in the map.
    pub fn chunk(&mut self, name : &str, data : &[u8]) -> usize {
        let (offset, length) = self.write_chunk(name, data);
        self.map.push((name.to_string(), offset, length));
        self.map.len() - 1
    }

    /// Lists a record in the map without writing a chunk
    pub fn raw_map_entry(&mut self, name : &str, offset : u64, length : u64) {
        self.map.push((name.to_string(), offset, length));
    }

    /// Rearranges the map records into the given order
    pub fn reorder_map(&mut self, order : &[usize]) {
        self.map = order.iter().map(|&i| self.map[i].clone()).collect();
    }

    pub fn omit_map_terminator(&mut self) {
        self.terminate_map = false;
    }

    pub fn finish(mut self) -> Vec<u8> {
        let mut payload = vec![];
        for (name, offset, length) in &self.map {
            payload.extend_from_slice(name.as_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&length.to_le_bytes());
        }
        let map_offset = self.bytes.len() as u64;
        if self.terminate_map {
            payload.extend_from_slice(CHUNK_MAP_SIGNATURE.as_bytes());
            payload.extend_from_slice(&map_offset.to_le_bytes());
            payload.extend_from_slice(&0u64.to_le_bytes());
        }
        self.write_chunk(CHUNK_MAP_NAME, &payload);

        self.bytes.extend_from_slice(CHUNK_MAP_SIGNATURE.as_bytes());
        self.bytes.extend_from_slice(&map_offset.to_le_bytes());
        self.bytes
    }
}

/// One loop of the synthetic experiment, outermost first
#[derive(Debug, Clone, Copy)]
pub struct LoopSpec {
    pub loop_type : u32,
    pub count : u32,
    pub interval : f64,
}

impl LoopSpec {
    pub fn new(loop_type : u32, count : u32, interval : f64) -> Self {
        LoopSpec { loop_type, count, interval }
    }
}

/// Description of a whole synthetic acquisition. Pixel
/// values are a deterministic function of frame, row,
/// column and component (see `pixel_value`).
#[derive(Debug, Clone)]
pub struct SyntheticNd2 {
    pub width : u32,
    pub height : u32,
    pub components : u32,
    pub bits_in_memory : u32,
    pub sequence_count : u32,
    pub compression : u32,
    pub loops : Vec<LoopSpec>,
    pub frame_metadata : bool,
    pub text_info : bool,
    pub binary_layers : Vec<(String, String, u32)>,
    /// Frames for which no pixel chunk is written
    pub missing_frames : Vec<u32>,
}

impl Default for SyntheticNd2 {
    fn default() -> Self {
        SyntheticNd2 {
            width : 6,
            height : 4,
            components : 2,
            bits_in_memory : 16,
            sequence_count : 12,
            compression : COMPRESSION_NONE,
            loops : vec![
                LoopSpec::new(LOOP_TIME, 3, 250.0),
                LoopSpec::new(LOOP_Z, 4, 1.5),
            ],
            frame_metadata : true,
            text_info : true,
            binary_layers : vec![],
            missing_frames : vec![],
        }
    }
}

pub fn align4(n : usize) -> usize {
    (n + 3) & !3
}

/// An attributes record for a single-frame file with any
/// geometry, including ones no real frame could match.
/// `uiWidthBytes` is always 4.
pub fn geometry_lv(width : u32, height : u32, components : u32, bits : u32, compression : u32)
-> Vec<u8> {
    encode_lv("SLxImageAttributes", &Lv::level(vec![
        ("uiWidth", Lv::U32(width)),
        ("uiWidthBytes", Lv::U32(4)),
        ("uiHeight", Lv::U32(height)),
        ("uiComp", Lv::U32(components)),
        ("uiBpcInMemory", Lv::U32(bits)),
        ("uiSequenceCount", Lv::U32(1)),
        ("eCompression", Lv::U32(compression)),
    ]))
}

/// Timestamp of frame `seq` followed by `pixels` deflated
pub fn zlib_frame_chunk(seq : u32, pixels : &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(pixels).expect("in-memory zlib write");
    let mut out = frame_time_ms(seq).to_le_bytes().to_vec();
    out.extend(encoder.finish().expect("in-memory zlib finish"));
    out
}

/// A container holding only an attributes chunk and frame 0,
/// with no experiment, text or picture metadata
pub fn single_frame_container(attributes_lv : &[u8], frame_chunk : &[u8]) -> Vec<u8> {
    let mut builder = ContainerBuilder::new();
    builder.chunk("ImageAttributesLV!", attributes_lv);
    builder.chunk("ImageDataSeq|0!", frame_chunk);
    builder.finish()
}

/// The value written for component `c` of pixel (`y`, `x`) in frame `seq`
pub fn pixel_value(seq : u32, y : u32, x : u32, c : u32, bits : u32) -> u32 {
    let modulus = 1u64 << bits.min(32);
    ((seq as u64 * 7 + y as u64 * 13 + x as u64 * 3 + c as u64 * 101) % modulus) as u32
}

pub fn frame_time_ms(seq : u32) -> f64 {
    seq as f64 * 10.0
}

pub fn stage_position(seq : u32) -> (f64, f64, f64) {
    (100.0 + seq as f64, 200.0 - seq as f64, 0.5 * seq as f64)
}

pub const START_JDN : f64 = 2_460_000.5;

impl SyntheticNd2 {
    pub fn bytes_per_component(&self) -> usize {
        ((self.bits_in_memory + 7) / 8) as usize
    }

    pub fn stride(&self) -> usize {
        align4(self.width as usize * self.components as usize * self.bytes_per_component())
    }

    /// Uncompressed pixel payload of frame `seq`, rows padded
    /// to the stride with zeros
    pub fn frame_pixels(&self, seq : u32) -> Vec<u8> {
        let bpc = self.bytes_per_component();
        let mut out = vec![0u8; self.stride() * self.height as usize];
        for y in 0..self.height {
            let row = &mut out[y as usize * self.stride()..];
            for x in 0..self.width {
                for c in 0..self.components {
                    let value = pixel_value(seq, y, x, c, self.bits_in_memory);
                    let at = (x as usize * self.components as usize + c as usize) * bpc;
                    row[at..at + bpc].copy_from_slice(&value.to_le_bytes()[..bpc]);
                }
            }
        }
        out
    }

    pub fn attributes_lv(&self) -> Vec<u8> {
        encode_lv("SLxImageAttributes", &Lv::level(vec![
            ("uiWidth", Lv::U32(self.width)),
            ("uiWidthBytes", Lv::U32(self.stride() as u32)),
            ("uiHeight", Lv::U32(self.height)),
            ("uiComp", Lv::U32(self.components)),
            ("uiBpcInMemory", Lv::U32(self.bits_in_memory)),
            ("uiBpcSignificant", Lv::U32(self.bits_in_memory.min(12))),
            ("uiSequenceCount", Lv::U32(self.sequence_count)),
            ("uiTileWidth", Lv::U32(0)),
            ("uiTileHeight", Lv::U32(0)),
            ("eCompression", Lv::U32(self.compression)),
            ("dCompressionParam", Lv::F64(0.0)),
            ("ePixelType", Lv::U32(1)),
            ("uiVirtualComponents", Lv::U32(self.components)),
        ]))
    }

    fn experiment_level(loops : &[LoopSpec]) -> Lv {
        let level = loops[0];
        let mut pars = vec![("uiCount", Lv::U32(level.count))];
        match level.loop_type {
            LOOP_TIME => pars.push(("dPeriod", Lv::F64(level.interval))),
            LOOP_Z => pars.push(("dZStep", Lv::F64(level.interval))),
            _ => {},
        }
        let mut items = vec![
            ("eType", Lv::U32(level.loop_type)),
            ("uLoopPars", Lv::level(pars)),
        ];
        if loops.len() > 1 {
            items.push((
                "ppNextLevelEx",
                Lv::level(vec![("i0000000000", Self::experiment_level(&loops[1..]))])
            ));
        }
        Lv::level(items)
    }

    pub fn experiment_lv(&self) -> Vec<u8> {
        if self.loops.is_empty() {
            return encode_lv("SLxExperiment", &Lv::level(vec![("eType", Lv::U32(0))]));
        }
        encode_lv("SLxExperiment", &Self::experiment_level(&self.loops))
    }

    pub fn picture_metadata_lv(&self, seq : u32) -> Vec<u8> {
        let (x, y, z) = stage_position(seq);
        let planes : Vec<(String, Lv)> = (0..self.components).map(|c| (
            format!("a{}", c),
            Lv::level(vec![
                ("sDescription", Lv::Str(format!("Channel {}", c))),
                ("sOpticalConfigName", Lv::str("Widefield")),
                ("uiColor", Lv::U32(0x00FF00 >> (c * 8))),
                ("uiCompCount", Lv::U32(1)),
                ("dEmissionWL", Lv::F64(500.0 + 50.0 * c as f64)),
            ])
        )).collect();

        encode_lv("SLxPictureMetadata", &Lv::level(vec![
            ("dTimeAbsolute", Lv::F64(START_JDN + frame_time_ms(seq) / 86_400_000.0)),
            ("dTimeMSec", Lv::F64(frame_time_ms(seq))),
            ("dXPos", Lv::F64(x)),
            ("dYPos", Lv::F64(y)),
            ("dZPos", Lv::F64(z)),
            ("dAngle", Lv::F64(0.0)),
            ("dCalibration", Lv::F64(0.65)),
            ("dAspect", Lv::F64(1.0)),
            ("wsObjectiveName", Lv::str("Plan Apo 20x")),
            ("dObjectiveMag", Lv::F64(20.0)),
            ("dObjectiveNA", Lv::F64(0.75)),
            ("dRefractIndex1", Lv::F64(1.0)),
            ("dRefractIndex2", Lv::F64(1.33)),
            ("dPinholeRadius", Lv::F64(0.0)),
            ("dZoom", Lv::F64(1.0)),
            ("dProjectiveMag", Lv::F64(1.0)),
            ("uiImageType", Lv::U32(0)),
            ("sPicturePlanes", Lv::level(vec![
                ("uiCount", Lv::U32(self.components)),
                ("uiCompCount", Lv::U32(self.components)),
                ("sPlaneNew", Lv::Level(planes)),
            ])),
        ]))
    }

    pub fn text_info_lv(&self) -> Vec<u8> {
        encode_lv("SLxImageTextInfo", &Lv::level(vec![
            ("TextInfoItem_0", Lv::str("IMG-0042")),
            ("TextInfoItem_4", Lv::str("A. Researcher")),
            ("TextInfoItem_5", Lv::str("Synthetic acquisition")),
            ("TextInfoItem_9", Lv::str("2024-05-27  10:15:00")),
            ("TextInfoItem_13", Lv::str("Plan Apo 20x")),
            ("TextInfoItem_14", Lv::str("NIS-Elements 5.30")),
        ]))
    }

    pub fn binary_layers_lv(&self) -> Vec<u8> {
        let layers : Vec<(String, Lv)> = self.binary_layers.iter().enumerate()
            .map(|(i, (name, comp, color))| (
                format!("i{:010}", i),
                Lv::level(vec![
                    ("Name", Lv::Str(name.clone())),
                    ("CompName", Lv::Str(comp.clone())),
                    ("Color", Lv::U32(*color)),
                ])
            )).collect();
        encode_lv("BinaryMetadata_v1", &Lv::Level(layers))
    }

    /// Frame data chunk payload: timestamp followed by the
    /// (possibly compressed) pixels
    pub fn frame_chunk(&self, seq : u32) -> Vec<u8> {
        let pixels = self.frame_pixels(seq);
        let mut out = frame_time_ms(seq).to_le_bytes().to_vec();
        match self.compression {
            COMPRESSION_LOSSLESS => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&pixels).expect("in-memory zlib write");
                out.extend(encoder.finish().expect("in-memory zlib finish"));
            },
            _ => out.extend(pixels),
        }
        out
    }

    /// Writes every chunk into a builder, leaving it open for
    /// tests that want to add or corrupt more
    pub fn builder(&self) -> ContainerBuilder {
        let mut builder = ContainerBuilder::new();
        builder.chunk("ImageAttributesLV!", &self.attributes_lv());
        builder.chunk("ImageMetadataLV!", &self.experiment_lv());
        if self.text_info {
            builder.chunk("ImageTextInfoLV!", &self.text_info_lv());
        }
        if !self.binary_layers.is_empty() {
            builder.chunk("CustomDataVar|BinaryMetadata_v1!", &self.binary_layers_lv());
        }
        for seq in 0..self.sequence_count {
            if self.frame_metadata {
                builder.chunk(
                    &format!("ImageMetadataSeqLV|{}!", seq),
                    &self.picture_metadata_lv(seq)
                );
            }
            if !self.missing_frames.contains(&seq) {
                builder.chunk(&format!("ImageDataSeq|{}!", seq), &self.frame_chunk(seq));
            }
        }
        builder
    }

    pub fn build(&self) -> Vec<u8> {
        self.builder().finish()
    }
}
