//! Code in this submodule converts between a frame's linear
//! sequence index and its loop coordinates.
//!
//! Coordinates are always given in the canonical dimension
//! order (Time, MultiPoint, ZStack, Other), whatever order
//! the loops were declared in, and form a mixed-radix number
//! with Time the most significant digit:
//!
//! ```text
//! seq = ((t * M + m) * Z + z) * O + o
//! ```
//!
//! Only dense acquisitions are handled: every combination of
//! loop indices is assumed to have a frame. Files with
//! skipped combinations are not remapped.

use crate::error::Nd2Error;
use crate::metadata::Experiment;

/// Converts loop coordinates to a sequence index.
///
/// ## Arguments
///
/// * `experiment` - The loops of the acquisition
///
/// * `coords` - Coordinates in canonical order. Missing
/// trailing dimensions are taken as 0.
///
/// ## Errors
///
/// * `Nd2Error::CoordinateOutOfRange` - naming the first
/// dimension whose coordinate is too large. Coordinates past
/// the fourth dimension can only be 0.
///
/// ## Example
///
/// ```rust, ignore
/// // Time : 3, ZStack : 4
/// assert_eq!(seq_index_from_coords(&experiment, &[1, 0, 3, 0])?, 7);
/// ```
pub fn seq_index_from_coords(experiment : &Experiment, coords : &[u32]) -> Result<u32, Nd2Error> {
    let sizes = experiment.dimension_sizes();

    for (dimension, &requested) in coords.iter().enumerate() {
        let max = sizes.get(dimension).map_or(0, |&size| size - 1);
        if requested > max {
            return Err(Nd2Error::CoordinateOutOfRange { dimension, requested, max });
        }
    }

    sizes.iter().enumerate()
        .try_fold(0u32, |acc, (dimension, &size)| {
            acc.checked_mul(size)?
                .checked_add(coords.get(dimension).copied().unwrap_or(0))
        })
        .ok_or_else(|| Nd2Error::FormatError(
            format!("coordinates {:?} in loops {:?} overflow a 32-bit sequence index", coords, sizes)
        ))
}

/// Converts a sequence index to loop coordinates, always
/// returning one entry per canonical dimension.
///
/// ## Errors
///
/// * `Nd2Error::FrameIndexOutOfRange` - if `seq_index` is not
/// smaller than the product of all loop sizes.
pub fn coords_from_seq_index(experiment : &Experiment, seq_index : u32) -> Result<Vec<u32>, Nd2Error> {
    let total = experiment.frame_count();
    if seq_index as u64 >= total {
        return Err(Nd2Error::FrameIndexOutOfRange {
            requested : seq_index,
            sequence_count : u32::try_from(total).unwrap_or(u32::MAX),
        });
    }

    let sizes = experiment.dimension_sizes();
    let mut coords = vec![0; sizes.len()];
    let mut remainder = seq_index;
    for dimension in (0..sizes.len()).rev() {
        coords[dimension] = remainder % sizes[dimension];
        remainder /= sizes[dimension];
    }
    Ok(coords)
}
