//! Picture metadata: the record stored alongside each frame
//! (`SLxPictureMetadata`). The per-frame fields become a
//! `FrameMetadata`; the record of the first frame also
//! carries the optics and channel description of the whole
//! file, returned as a `MetadataDescription`.

use crate::error::Nd2Error;
use crate::metadata::lite_variant::{decode_record, LvLevel};

const RECORD : &str = "SLxPictureMetadata";

/// At most this many picture planes are described
pub const MAX_PICTURE_PLANES : usize = 256;

/// Stage coordinates in micrometres
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StagePosition {
    pub x : f64,
    pub y : f64,
    pub z : f64,
}

/// Acquisition data for one frame. Built fresh on every call,
/// never cached by the reader.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetadata {
    /// Milliseconds since the first frame
    pub relative_time_ms : f64,
    pub stage_position_um : StagePosition,
    /// Acquisition time as a Julian day number, if recorded
    pub absolute_julian_day : Option<f64>,
}

impl FrameMetadata {
    pub (crate) fn decode(data : &[u8]) -> Result<Self, Nd2Error> {
        let record = decode_record(data, RECORD)?;
        Ok(Self::from_record(&record))
    }

    fn from_record(record : &LvLevel) -> Self {
        FrameMetadata {
            relative_time_ms : record.f64("dTimeMSec").unwrap_or(0.0),
            stage_position_um : StagePosition {
                x : record.f64("dXPos").unwrap_or(0.0),
                y : record.f64("dYPos").unwrap_or(0.0),
                z : record.f64("dZPos").unwrap_or(0.0),
            },
            absolute_julian_day : record.f64("dTimeAbsolute").filter(|&t| t != 0.0),
        }
    }

    /// Frame metadata when only the timestamp stored in front
    /// of the pixels is available
    pub (crate) fn from_timestamp(relative_time_ms : f64) -> Self {
        FrameMetadata {
            relative_time_ms,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageType {
    #[default]
    Normal,
    Spectral,
}

/// One logical channel of the image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PicturePlane {
    pub name : String,
    pub optical_config_name : String,
    /// Display colour, `0x00BBGGRR`
    pub color_rgb : u32,
    /// Physical components making up this plane
    pub component_count : u32,
    /// Emission wavelength in nm, 0.0 if unknown
    pub emission_wavelength_nm : f64,
}

/// Optics and channel description of the whole acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDescription {
    /// Start of the acquisition as a Julian day number
    pub time_start_jdn : f64,
    pub angle : f64,
    /// Micrometres per pixel, 0.0 means uncalibrated
    pub calibration_um_per_px : f64,
    pub aspect : f64,
    pub objective_name : String,
    pub objective_magnification : f64,
    pub objective_na : f64,
    pub refractive_index_1 : f64,
    pub refractive_index_2 : f64,
    pub pinhole_radius : f64,
    pub zoom : f64,
    pub projective_magnification : f64,
    pub image_type : ImageType,
    /// Physical components across all planes
    pub component_count : u32,
    pub planes : Vec<PicturePlane>,
}

impl MetadataDescription {
    pub fn is_calibrated(&self) -> bool {
        self.calibration_um_per_px != 0.0
    }

    pub (crate) fn decode(data : &[u8]) -> Result<Self, Nd2Error> {
        let record = decode_record(data, RECORD)?;

        let mut description = MetadataDescription {
            time_start_jdn : record.f64("dTimeAbsolute").unwrap_or(0.0),
            angle : record.f64("dAngle").unwrap_or(0.0),
            calibration_um_per_px : record.f64("dCalibration").unwrap_or(0.0),
            aspect : record.f64("dAspect").unwrap_or(1.0),
            objective_name : record.string("wsObjectiveName").unwrap_or_default().to_string(),
            objective_magnification : record.f64("dObjectiveMag").unwrap_or(0.0),
            objective_na : record.f64("dObjectiveNA").unwrap_or(0.0),
            refractive_index_1 : record.f64("dRefractIndex1").unwrap_or(0.0),
            refractive_index_2 : record.f64("dRefractIndex2").unwrap_or(0.0),
            pinhole_radius : record.f64("dPinholeRadius").unwrap_or(0.0),
            zoom : record.f64("dZoom").unwrap_or(0.0),
            projective_magnification : record.f64("dProjectiveMag").unwrap_or(0.0),
            image_type : match record.u32("uiImageType") {
                Some(1) => ImageType::Spectral,
                _ => ImageType::Normal,
            },
            component_count : 0,
            planes : vec![],
        };

        if let Some(planes) = record.level("sPicturePlanes") {
            description.component_count = planes.u32("uiCompCount").unwrap_or(0);
            if let Some(plane_list) = planes.level("sPlaneNew").or_else(|| planes.level("sPlane")) {
                if plane_list.levels().count() > MAX_PICTURE_PLANES {
                    return Err(Nd2Error::FormatError(format!(
                        "more than {} picture planes", MAX_PICTURE_PLANES
                    )));
                }
                description.planes = plane_list.levels()
                    .map(|(_, plane)| PicturePlane {
                        name : plane.string("sDescription").unwrap_or_default().to_string(),
                        optical_config_name : plane.string("sOpticalConfigName")
                            .unwrap_or_default().to_string(),
                        color_rgb : plane.u32("uiColor").unwrap_or(0),
                        component_count : plane.u32("uiCompCount").unwrap_or(1),
                        emission_wavelength_nm : plane.f64("dEmissionWL").unwrap_or(0.0),
                    })
                    .collect();
            }
        }
        Ok(description)
    }
}
