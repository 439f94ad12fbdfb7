//! The primary `Nd2Reader` object, which opens `.nd2`
//! containers, keeps the parsed chunk map and image
//! attributes, and decodes frames and metadata on request.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::{
    binary::BinaryReader,
    container::{ChunkIndex, FormatConstants, read_chunk, read_chunk_data},
    data::{self, image::{FrameSource, PixelBuffer}},
    error::Nd2Error,
    metadata::{
        Attributes,
        BinaryLayerDescriptor,
        Experiment,
        FrameMetadata,
        LoopLevel,
        MetadataDescription,
        TextInfo,
    },
    utils::{parallelize_op, FRAMES_PER_WORKER},
};

/// State that only exists while the file is open.
struct OpenContainer<R> {
    reader : BinaryReader<R>,
    version : Option<(u32, u32)>,
    index : ChunkIndex,
    attributes : Attributes,
    experiment : Experiment,
}

impl<R> OpenContainer<R> {
    /// Splits the container into a `FrameSource` over its
    /// parsed state and the reader that source decodes from.
    fn frame_source<'a>(&'a mut self, constants : &'a FormatConstants)
    -> (FrameSource<'a>, &'a mut BinaryReader<R>) {
        let source = FrameSource {
            index : &self.index,
            attributes : &self.attributes,
            constants,
        };
        (source, &mut self.reader)
    }
}

/// A reader for a single `.nd2` file.
///
/// Opening parses the chunk map, image attributes and
/// experiment loops. Everything else (text info, binary
/// layers, per-frame metadata, pixels) is decoded only when
/// asked for, and every decoded value is owned by the caller.
///
/// Lifecycle is `Open -> Closed`: after `close` every method
/// that needs the file returns `Nd2Error::InvalidState`, and
/// `close` itself can be called any number of times.
///
/// A single reader is not meant to be shared between
/// threads; use `decode_frames` (which opens a local copy of
/// the file per worker) or open one reader per thread.
///
/// ## Example
///
/// ```rust, ignore
/// let mut reader = Nd2Reader::open("acquisition.nd2")?;
/// let (frame, meta) = reader.decode_frame(0)?;
/// println!("{}x{} at {} ms", frame.width(), frame.height(), meta.relative_time_ms);
/// reader.close();
/// ```
pub struct Nd2Reader<R = BufReader<File>> {
    filename : Option<PathBuf>,
    constants : FormatConstants,
    state : Option<OpenContainer<R>>,
}

impl Nd2Reader<BufReader<File>> {
    /// Opens a file with the standard `.nd2` constants.
    ///
    /// ## Arguments
    ///
    /// * `path` - Path to the `.nd2` file
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::IOError` - the file cannot be opened or read
    /// * `Nd2Error::CorruptContainer` - the file is not an `.nd2` container
    /// * `Nd2Error::MissingChunk` - the file has no image attributes
    /// * `Nd2Error::FormatError` - the attributes or experiment are malformed
    pub fn open<P : AsRef<Path>>(path : P) -> Result<Self, Nd2Error> {
        Self::open_with(path, FormatConstants::default())
    }

    /// Opens a file, validating it against `constants`
    /// instead of the standard values.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open_with<P : AsRef<Path>>(path : P, constants : FormatConstants)
    -> Result<Self, Nd2Error> {
        let file = File::open(path.as_ref())?;
        let mut reader = Self::from_reader_with(BufReader::new(file), constants)?;
        reader.filename = Some(path.as_ref().to_path_buf());
        Ok(reader)
    }
}

impl<R : Read + Seek> Nd2Reader<R> {
    /// Reads a container from anything that can `Read` and
    /// `Seek`, e.g. an in-memory `Cursor`.
    pub fn from_reader(inner : R) -> Result<Self, Nd2Error> {
        Self::from_reader_with(inner, FormatConstants::default())
    }

    pub fn from_reader_with(inner : R, constants : FormatConstants) -> Result<Self, Nd2Error> {
        let mut reader = BinaryReader::new(inner)?;

        let version = read_version(&mut reader, &constants)?;
        let index = ChunkIndex::parse(&mut reader, &constants)?;

        let entry = index.get(&constants.attributes).ok_or_else(|| Nd2Error::MissingChunk {
            name : constants.attributes.clone(),
        })?;
        let attributes = Attributes::decode(
            &read_chunk_data(&mut reader, entry, constants.chunk_magic)?
        ).map_err(|err| err.in_chunk(&constants.attributes))?;

        let experiment = match index.get(&constants.experiment) {
            Some(entry) => Experiment::decode(
                &read_chunk_data(&mut reader, entry, constants.chunk_magic)?
            ).map_err(|err| err.in_chunk(&constants.experiment))?,
            None => Experiment::default(),
        };

        if experiment.frame_count() != attributes.sequence_count as u64 {
            tracing::warn!(
                sequence_count = attributes.sequence_count,
                loop_product = experiment.frame_count(),
                "frame count differs from the product of the loop sizes"
            );
        }

        tracing::debug!(
            chunks = index.len(),
            version = ?version,
            frames = attributes.sequence_count,
            loops = experiment.level_count(),
            "opened container"
        );

        Ok(Nd2Reader {
            filename : None,
            constants,
            state : Some(OpenContainer { reader, version, index, attributes, experiment }),
        })
    }

    fn container(&self, op : &'static str) -> Result<&OpenContainer<R>, Nd2Error> {
        self.state.as_ref().ok_or(Nd2Error::InvalidState(op))
    }

    fn container_mut(&mut self, op : &'static str) -> Result<&mut OpenContainer<R>, Nd2Error> {
        self.state.as_mut().ok_or(Nd2Error::InvalidState(op))
    }

    fn frame_source(&mut self, op : &'static str)
    -> Result<(FrameSource<'_>, &mut BinaryReader<R>), Nd2Error> {
        let container = self.state.as_mut().ok_or(Nd2Error::InvalidState(op))?;
        Ok(container.frame_source(&self.constants))
    }

    /// Releases the file and everything parsed from it.
    /// Closing an already closed reader does nothing.
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            tracing::debug!(path = ?self.filename, "closed container");
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Path the reader was opened from, `None` for readers
    /// built with `from_reader`.
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn constants(&self) -> &FormatConstants {
        &self.constants
    }

    /// `(major, minor)` from the file signature, `None` if it
    /// could not be parsed.
    pub fn version(&self) -> Result<Option<(u32, u32)>, Nd2Error> {
        Ok(self.container("version")?.version)
    }

    pub fn attributes(&self) -> Result<&Attributes, Nd2Error> {
        Ok(&self.container("attributes")?.attributes)
    }

    pub fn experiment(&self) -> Result<&Experiment, Nd2Error> {
        Ok(&self.container("experiment")?.experiment)
    }

    pub fn chunk_index(&self) -> Result<&ChunkIndex, Nd2Error> {
        Ok(&self.container("chunk_index")?.index)
    }

    /// Number of frames declared by the attributes
    pub fn sequence_count(&self) -> Result<u32, Nd2Error> {
        Ok(self.container("sequence_count")?.attributes.sequence_count)
    }

    /// Number of loops, as declared
    pub fn coord_size(&self) -> Result<usize, Nd2Error> {
        Ok(self.container("coord_size")?.experiment.level_count())
    }

    /// The `i`-th loop in declared (outermost first) order
    pub fn coord_info(&self, i : usize) -> Result<Option<LoopLevel>, Nd2Error> {
        Ok(self.container("coord_info")?.experiment.levels().get(i).copied())
    }

    /// Text annotations. Every field is empty if the file
    /// carries none.
    pub fn text_info(&mut self) -> Result<TextInfo, Nd2Error> {
        let name = self.constants.text_info.clone();
        let magic = self.constants.chunk_magic;
        let container = self.container_mut("text_info")?;
        match container.index.get(&name) {
            Some(entry) => {
                let data = read_chunk_data(&mut container.reader, entry, magic)?;
                TextInfo::decode(&data).map_err(|err| err.in_chunk(&name))
            },
            None => Ok(TextInfo::default()),
        }
    }

    /// Descriptors of the binary layers, empty if there are none.
    pub fn binary_layers(&mut self) -> Result<Vec<BinaryLayerDescriptor>, Nd2Error> {
        let name = self.constants.binary_layers.clone();
        let magic = self.constants.chunk_magic;
        let container = self.container_mut("binary_layers")?;
        match container.index.get(&name) {
            Some(entry) => {
                let data = read_chunk_data(&mut container.reader, entry, magic)?;
                BinaryLayerDescriptor::decode_all(&data).map_err(|err| err.in_chunk(&name))
            },
            None => Ok(vec![]),
        }
    }

    /// Optics and channel description, read from the
    /// picture metadata of the first frame. All defaults if
    /// the first frame has none.
    pub fn metadata(&mut self) -> Result<MetadataDescription, Nd2Error> {
        let name = self.constants.frame_metadata_chunk(0);
        let magic = self.constants.chunk_magic;
        let container = self.container_mut("metadata")?;
        match container.index.get(&name) {
            Some(entry) => {
                let data = read_chunk_data(&mut container.reader, entry, magic)?;
                MetadataDescription::decode(&data).map_err(|err| err.in_chunk(&name))
            },
            None => Ok(MetadataDescription::default()),
        }
    }

    /// Metadata of one frame without decoding its pixels.
    pub fn frame_metadata(&mut self, seq_index : u32) -> Result<FrameMetadata, Nd2Error> {
        let (source, reader) = self.frame_source("frame_metadata")?;
        source.frame_metadata(reader, seq_index)
    }

    /// See `data::seq_index_from_coords`
    pub fn seq_index_from_coords(&self, coords : &[u32]) -> Result<u32, Nd2Error> {
        data::seq_index_from_coords(&self.container("seq_index_from_coords")?.experiment, coords)
    }

    /// See `data::coords_from_seq_index`
    pub fn coords_from_seq_index(&self, seq_index : u32) -> Result<Vec<u32>, Nd2Error> {
        data::coords_from_seq_index(&self.container("coords_from_seq_index")?.experiment, seq_index)
    }

    /// Decodes the pixels and metadata of one frame.
    ///
    /// ## Arguments
    ///
    /// * `seq_index` - Linear index of the frame, in `0..sequence_count`
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::InvalidState` - the reader is closed
    /// * `Nd2Error::FrameIndexOutOfRange` - `seq_index >= sequence_count`
    /// * `Nd2Error::MissingFrame` - the file has no chunk for this frame
    /// * `Nd2Error::UnsupportedCompression` - the file uses lossy compression
    /// * `Nd2Error::SizeMismatch` - the plane has the wrong number of bytes
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let (frame, meta) = reader.decode_frame(7)?;
    /// let image = frame.to_array3::<u16>()?;
    /// ```
    #[tracing::instrument(skip(self))]
    pub fn decode_frame(&mut self, seq_index : u32)
    -> Result<(PixelBuffer, FrameMetadata), Nd2Error> {
        let (source, reader) = self.frame_source("decode_frame")?;
        let decoded = source.decode(reader, seq_index)?;
        tracing::trace!(bytes = decoded.0.data().len(), "decoded frame");
        Ok(decoded)
    }

    /// Decodes the frame at loop coordinates `coords`, given
    /// in canonical (Time, MultiPoint, ZStack, Other) order.
    pub fn decode_frame_at(&mut self, coords : &[u32])
    -> Result<(PixelBuffer, FrameMetadata), Nd2Error> {
        let seq_index = self.seq_index_from_coords(coords)?;
        self.decode_frame(seq_index)
    }

    /// Decodes many frames, returned in the order requested.
    ///
    /// If the reader was opened from a path, frames are decoded
    /// in parallel, with each worker opening its own copy of the
    /// file. Readers built with `from_reader` decode one frame
    /// after another.
    ///
    /// ## Errors
    ///
    /// The first error encountered, as for `decode_frame`.
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let z_stack : Vec<u32> = (0..4).map(|z| reader.seq_index_from_coords(&[2, 0, z])).collect::<Result<_,_>>()?;
    /// let frames = reader.decode_frames(&z_stack)?;
    /// ```
    pub fn decode_frames(&mut self, frames : &[u32])
    -> Result<Vec<(PixelBuffer, FrameMetadata)>, Nd2Error> {
        let filename = self.filename.clone();
        let (source, reader) = self.frame_source("decode_frames")?;

        match filename {
            Some(filename) => {
                parallelize_op!(
                    FRAMES_PER_WORKER,
                    frames,
                    &filename,
                    |local_frames : &[u32], local_reader : &mut BinaryReader<BufReader<File>>| {
                        local_frames.iter()
                            .map(|&seq_index| source.decode(local_reader, seq_index))
                            .collect::<Result<Vec<_>, Nd2Error>>()
                    }
                )
            },
            None => {
                frames.iter()
                    .map(|&seq_index| source.decode(reader, seq_index))
                    .collect()
            },
        }
    }
}

/// Reads the signature chunk at the start of the file and
/// parses the `Ver<major>.<minor>` string it holds.
fn read_version<R : Read + Seek>(reader : &mut BinaryReader<R>, constants : &FormatConstants)
-> Result<Option<(u32, u32)>, Nd2Error> {
    let signature = read_chunk(reader, 0, constants.chunk_magic)?;
    if signature.name.as_slice() != constants.file_signature.as_bytes() {
        return Err(Nd2Error::CorruptContainer {
            offset : 0,
            reason : format!(
                "first chunk is `{}`, not the file signature",
                String::from_utf8_lossy(&signature.name)
            ),
        });
    }

    let text = String::from_utf8_lossy(&signature.data);
    let version = text.trim_end_matches('\0')
        .strip_prefix("Ver")
        .and_then(|v| v.split_once('.'))
        .and_then(|(major, minor)| Some((major.parse().ok()?, minor.parse().ok()?)));

    if version.is_none() {
        tracing::warn!(signature = %text, "unrecognized version string");
    }
    Ok(version)
}
