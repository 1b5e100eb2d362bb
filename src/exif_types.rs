// src/exif_types.rs
//
// Flattened EXIF tag table and the tag IDs the extractor consumes.
// Tags from the primary IFD and the GPS IFD share one u16 key space.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum size for binary EXIF values (exclude thumbnails and large blobs)
pub const MAX_TAG_SIZE: usize = 1024;

/// Tag ID -> value, as produced by a [`crate::exif_extract::TagReader`].
pub type TagTable = BTreeMap<u16, ExifValue>;

/// Generic value type for decoded EXIF fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExifValue {
    Byte(u8),
    Bytes(Vec<u8>),
    Short(u16),
    Shorts(Vec<u16>),
    Long(u32),
    Signed(i32),
    /// Converted from Rational/SRational
    Float(f64),
    /// Multiple rationals (GPS degree/minute/second triples)
    Floats(Vec<f64>),
    /// ASCII or UTF-8 string (trimmed, null bytes removed)
    String(String),
}

impl ExifValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExifValue::Byte(v) => Some(*v as f64),
            ExifValue::Short(v) => Some(*v as f64),
            ExifValue::Long(v) => Some(*v as f64),
            ExifValue::Signed(v) => Some(*v as f64),
            ExifValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ExifValue::Byte(v) => Some(*v as u32),
            ExifValue::Short(v) => Some(*v as u32),
            ExifValue::Long(v) => Some(*v),
            ExifValue::Shorts(v) => v.first().map(|n| *n as u32),
            _ => None,
        }
    }

    /// Components of a multi-valued numeric tag.
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            ExifValue::Floats(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExifValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get value as string for display
    pub fn as_string(&self) -> String {
        match self {
            ExifValue::Byte(v) => v.to_string(),
            ExifValue::Bytes(v) => format!("{:?}", v),
            ExifValue::Short(v) => v.to_string(),
            ExifValue::Shorts(v) => format!("{:?}", v),
            ExifValue::Long(v) => v.to_string(),
            ExifValue::Signed(v) => v.to_string(),
            ExifValue::Float(v) => format!("{:.4}", v),
            ExifValue::Floats(v) => {
                v.iter().map(|f| format!("{:.6}", f)).collect::<Vec<_>>().join(", ")
            }
            ExifValue::String(s) => s.clone(),
        }
    }
}

// =============================================================================
// EXIF Tag IDs
// =============================================================================

pub const TAG_MAKE: u16 = 0x010F;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_DATETIME: u16 = 0x0132;
pub const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
pub const TAG_DATETIME_DIGITIZED: u16 = 0x9004;

// GPS tags (in GPS IFD, but we store with these IDs)
pub const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
pub const TAG_GPS_LATITUDE: u16 = 0x0002;
pub const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
pub const TAG_GPS_LONGITUDE: u16 = 0x0004;
pub const TAG_GPS_ALTITUDE_REF: u16 = 0x0005;
pub const TAG_GPS_ALTITUDE: u16 = 0x0006;

// Tags to exclude (thumbnails and large binary data)
pub const TAG_JPEG_INTERCHANGE_FORMAT: u16 = 0x0201;
pub const TAG_JPEG_INTERCHANGE_FORMAT_LENGTH: u16 = 0x0202;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_MAKER_NOTE: u16 = 0x927C;

/// Check if a tag should be excluded from the table
pub fn is_excluded_tag(tag_id: u16) -> bool {
    matches!(
        tag_id,
        TAG_JPEG_INTERCHANGE_FORMAT
            | TAG_JPEG_INTERCHANGE_FORMAT_LENGTH
            | TAG_STRIP_OFFSETS
            | TAG_STRIP_BYTE_COUNTS
            | TAG_MAKER_NOTE
    )
}

/// Map tag ID to human-readable name
pub fn tag_id_to_name(tag_id: u16) -> Option<&'static str> {
    Some(match tag_id {
        TAG_MAKE => "Make",
        TAG_MODEL => "Model",
        TAG_ORIENTATION => "Orientation",
        TAG_DATETIME => "DateTime",
        TAG_DATETIME_ORIGINAL => "DateTimeOriginal",
        TAG_DATETIME_DIGITIZED => "DateTimeDigitized",
        TAG_GPS_LATITUDE_REF => "GPSLatitudeRef",
        TAG_GPS_LATITUDE => "GPSLatitude",
        TAG_GPS_LONGITUDE_REF => "GPSLongitudeRef",
        TAG_GPS_LONGITUDE => "GPSLongitude",
        TAG_GPS_ALTITUDE_REF => "GPSAltitudeRef",
        TAG_GPS_ALTITUDE => "GPSAltitude",
        _ => return None,
    })
}
