//! The experiment record describes the loops an acquisition
//! ran (time-lapse, stage positions, z-stack, ...). It is
//! stored as a chain of nested levels, outermost loop first,
//! each level pointing to the next through `ppNextLevelEx`.

use itertools::Itertools;

use crate::error::Nd2Error;
use crate::metadata::lite_variant::{decode_record, LvLevel};

const RECORD : &str = "SLxExperiment";

/// The four dimensions a loop can run along. Their
/// declaration order here is the canonical order used to
/// lay out frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoopType {
    Time,
    MultiPoint,
    ZStack,
    Other,
}

impl LoopType {
    /// Slowest-varying first
    pub const CANONICAL : [LoopType; 4] = [
        LoopType::Time,
        LoopType::MultiPoint,
        LoopType::ZStack,
        LoopType::Other,
    ];

    pub fn canonical_index(self) -> usize {
        match self {
            LoopType::Time => 0,
            LoopType::MultiPoint => 1,
            LoopType::ZStack => 2,
            LoopType::Other => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LoopType::Time => "Time",
            LoopType::MultiPoint => "MultiPoint",
            LoopType::ZStack => "ZStack",
            LoopType::Other => "Other",
        }
    }

    /// Maps the stored `eType` tag. Both time-lapse flavours
    /// become `Time`; spectral, custom and unknown loops
    /// become `Other`.
    fn from_code(code : u32) -> Self {
        match code {
            1 | 8 => LoopType::Time,
            2 => LoopType::MultiPoint,
            4 => LoopType::ZStack,
            _ => LoopType::Other,
        }
    }
}

impl std::fmt::Display for LoopType {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One loop of an acquisition. `interval` is kept exactly as
/// stored and its unit depends on `loop_type`: milliseconds
/// for `Time`, micrometres for `ZStack`, -1.0 (no meaning) for
/// `MultiPoint`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopLevel {
    pub loop_type : LoopType,
    pub loop_size : u32,
    pub interval : f64,
}

impl LoopLevel {
    pub fn new(loop_type : LoopType, loop_size : u32, interval : f64) -> Self {
        LoopLevel { loop_type, loop_size, interval }
    }
}

/// The loops of an acquisition, outermost first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Experiment {
    levels : Vec<LoopLevel>,
}

const ETYPE_NETIME : u32 = 8;

/// Reads one level of the chain. `None` means the level
/// exists but contributes no loop.
fn decode_level(level : &LvLevel) -> Result<Option<LoopLevel>, Nd2Error> {
    let code = level.u32("eType").unwrap_or(0);
    let pars = match level.level("uLoopPars") {
        Some(pars) => pars,
        None if code == 0 => return Ok(None),
        None => return Err(Nd2Error::FormatError(
            format!("loop of type {} has no `uLoopPars`", code)
        )),
    };
    let loop_type = LoopType::from_code(code);

    let mut loop_size = if code == ETYPE_NETIME && pars.level("pPeriod").is_some() {
        pars.level("pPeriod").into_iter()
            .flat_map(|periods| periods.levels())
            .map(|(_, period)| period.u32("uiCount").unwrap_or(0))
            .sum()
    } else {
        pars.require_u32("uiCount")?
    };

    // Items the acquisition skipped are excluded from the loop
    if let Some(valid) = level.bytes("pItemValid").or_else(|| pars.bytes("pItemValid")) {
        loop_size = valid.iter().filter(|&&b| b != 0).count() as u32;
    }

    let interval = match loop_type {
        LoopType::Time if code == ETYPE_NETIME => {
            pars.level("pPeriod")
                .and_then(|periods| periods.levels().next())
                .and_then(|(_, period)| period.f64("dPeriod"))
                .or_else(|| pars.f64("dPeriod"))
                .unwrap_or(0.0)
        },
        LoopType::Time => pars.f64("dPeriod").unwrap_or(0.0),
        LoopType::ZStack => pars.f64("dZStep").unwrap_or(0.0),
        LoopType::MultiPoint => -1.0,
        LoopType::Other => pars.f64("dPeriod").unwrap_or(0.0),
    };

    if loop_size == 0 {
        tracing::warn!(loop_type = %loop_type, "skipping loop with no items");
        return Ok(None);
    }
    Ok(Some(LoopLevel::new(loop_type, loop_size, interval)))
}

impl Experiment {
    /// The format never nests more loops than this
    pub const MAX_LEVELS : usize = 8;

    /// Builds an experiment from loops listed outermost first.
    ///
    /// ## Errors
    ///
    /// * `Nd2Error::FormatError` - if there are more than
    /// `MAX_LEVELS` loops, a loop is empty, two loops map
    /// onto the same canonical dimension, or the loops hold
    /// more frames than a `u32` sequence index can address.
    pub fn new(levels : Vec<LoopLevel>) -> Result<Self, Nd2Error> {
        if levels.len() > Self::MAX_LEVELS {
            return Err(Nd2Error::FormatError(format!(
                "{} loop levels, at most {} allowed", levels.len(), Self::MAX_LEVELS
            )));
        }
        if let Some(empty) = levels.iter().find(|l| l.loop_size == 0) {
            return Err(Nd2Error::FormatError(
                format!("{} loop has no items", empty.loop_type)
            ));
        }
        if let Some(dup) = levels.iter().map(|l| l.loop_type).duplicates().next() {
            return Err(Nd2Error::FormatError(
                format!("more than one {} loop", dup)
            ));
        }
        // sequence indices are u32, so every coordinate must map into one
        let total = levels.iter()
            .try_fold(1u32, |acc, level| acc.checked_mul(level.loop_size));
        if total.is_none() {
            return Err(Nd2Error::FormatError(format!(
                "loop sizes {:?} describe more than {} frames",
                levels.iter().map(|l| l.loop_size).collect::<Vec<_>>(), u32::MAX
            )));
        }
        Ok(Experiment { levels })
    }

    /// Decodes the payload of the experiment chunk
    pub (crate) fn decode(data : &[u8]) -> Result<Self, Nd2Error> {
        let mut current = Some(decode_record(data, RECORD)?);
        let mut levels = vec![];
        // A well-formed chain never exceeds this many links
        let mut links = 0;

        while let Some(level) = current {
            links += 1;
            if links > Self::MAX_LEVELS + 1 {
                return Err(Nd2Error::FormatError(format!(
                    "loop chain longer than {} levels", Self::MAX_LEVELS
                )));
            }
            if let Some(loop_level) = decode_level(&level)? {
                levels.push(loop_level);
            }
            current = level.level("ppNextLevelEx")
                .and_then(|next| next.levels().next())
                .map(|(_, next)| next.clone());
        }
        Self::new(levels)
    }

    /// Loops in declared (outermost first) order
    pub fn levels(&self) -> &[LoopLevel] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, loop_type : LoopType) -> Option<&LoopLevel> {
        self.levels.iter().find(|l| l.loop_type == loop_type)
    }

    /// Loop sizes in canonical (Time, MultiPoint, ZStack, Other)
    /// order, 1 for any dimension the acquisition did not loop over.
    pub fn dimension_sizes(&self) -> [u32; 4] {
        let mut sizes = [1; 4];
        for level in &self.levels {
            sizes[level.loop_type.canonical_index()] = level.loop_size;
        }
        sizes
    }

    /// Number of frames a dense acquisition of these loops
    /// would hold
    pub fn frame_count(&self) -> u64 {
        self.dimension_sizes().iter()
            .fold(1u64, |acc, &size| acc.saturating_mul(size as u64))
    }

    /// Every canonical coordinate, in sequence-index order.
    pub fn iter_coords(&self) -> impl Iterator<Item = Vec<u32>> {
        self.dimension_sizes()
            .into_iter()
            .map(|size| 0..size)
            .multi_cartesian_product()
    }
}
