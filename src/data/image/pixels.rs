use ndarray::Array3;

use crate::error::Nd2Error;
use crate::metadata::Attributes;

/// One decoded frame, components interleaved within each
/// pixel and rows padded to `stride_bytes`. Owned entirely by
/// the caller; the reader keeps no reference to it.
///
/// Always satisfies `data.len() == stride_bytes * height` and
/// `stride_bytes >= width * component_count * bytes_per_component`,
/// rounded up to a multiple of 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width : u32,
    height : u32,
    bits_per_component : u32,
    component_count : u32,
    stride_bytes : usize,
    data : Vec<u8>,
}

impl PixelBuffer {
    /// Wraps fully decoded pixel bytes, checking their length
    /// against the geometry in `attributes`.
    pub (crate) fn from_decoded(
        attributes : &Attributes,
        data : Vec<u8>,
        chunk : &str,
        ) -> Result<Self, Nd2Error> {
        let expected = attributes.frame_bytes();
        if data.len() as u64 != expected {
            return Err(Nd2Error::SizeMismatch {
                chunk : chunk.to_string(),
                expected,
                actual : data.len() as u64,
            });
        }
        Ok(PixelBuffer {
            width : attributes.width_px,
            height : attributes.height_px,
            bits_per_component : attributes.bits_per_component_in_memory,
            component_count : attributes.component_count,
            stride_bytes : attributes.stride_bytes() as usize,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits_per_component(&self) -> u32 {
        self.bits_per_component
    }

    pub fn bytes_per_component(&self) -> usize {
        let bits = self.bits_per_component;
        (bits / 8 + (bits % 8 != 0) as u32) as usize
    }

    pub fn component_count(&self) -> u32 {
        self.component_count
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    /// Raw bytes, padding included
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bytes of the pixels in one row, without the padding
    fn row_len(&self) -> usize {
        self.width as usize * self.component_count as usize * self.bytes_per_component()
    }

    /// Pixel bytes of row `y`, without padding
    pub fn row(&self, y : u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride_bytes;
        self.data.get(start..start + self.row_len())
    }

    /// Value of component `c` of the pixel at (`y`, `x`),
    /// widened to `u32`.
    pub fn component(&self, y : u32, x : u32, c : u32) -> Option<u32> {
        if x >= self.width || c >= self.component_count {
            return None;
        }
        let bpc = self.bytes_per_component();
        let at = (x as usize * self.component_count as usize + c as usize) * bpc;
        let bytes = self.row(y)?.get(at..at + bpc)?;
        let mut value = [0u8; 4];
        value[..bpc.min(4)].copy_from_slice(&bytes[..bpc.min(4)]);
        Some(u32::from_le_bytes(value))
    }

    /// Copies the frame into a `(height, width, components)`
    /// array, dropping row padding. `T` must be exactly as wide
    /// as one stored component (`u8` for 8-bit data, `u16` for
    /// 9 to 16-bit data, ...).
    ///
    /// ## Example
    ///
    /// ```rust, ignore
    /// let (frame, _) = reader.decode_frame(0)?;
    /// let image = frame.to_array3::<u16>()?;
    /// let first_channel = image.slice(s![.., .., 0]);
    /// ```
    pub fn to_array3<T : bytemuck::Pod>(&self) -> Result<Array3<T>, Nd2Error> {
        if std::mem::size_of::<T>() != self.bytes_per_component() {
            return Err(Nd2Error::FormatError(format!(
                "{}-byte components cannot be viewed as {}-byte values",
                self.bytes_per_component(), std::mem::size_of::<T>()
            )));
        }

        let mut values : Vec<T> = Vec::with_capacity(
            self.height as usize * self.width as usize * self.component_count as usize
        );
        for y in 0..self.height {
            let row = self.row(y).ok_or_else(|| Nd2Error::FormatError(
                format!("row {} missing from pixel buffer", y)
            ))?;
            values.extend(bytemuck::pod_collect_to_vec::<u8, T>(row));
        }

        Array3::from_shape_vec(
            (self.height as usize, self.width as usize, self.component_count as usize),
            values
        ).map_err(|err| Nd2Error::FormatError(err.to_string()))
    }
}
