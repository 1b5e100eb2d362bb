// EXIF extraction: decode a byte stream into a flat tag table, then derive
// the geotag and capture time the pipeline needs.
// Decoding never fails towards the caller; every error degrades to
// "no geotag" and the fallback timestamp.
use crate::error::ExtractError;
use crate::exif_types::{
    ExifValue, MAX_TAG_SIZE, TAG_DATETIME_ORIGINAL, TAG_GPS_LATITUDE, TAG_GPS_LATITUDE_REF,
    TAG_GPS_LONGITUDE, TAG_GPS_LONGITUDE_REF, TAG_ORIENTATION, TagTable, is_excluded_tag,
};
use crate::photo::GeoTag;
use chrono::NaiveDateTime;
use exif::{Context, In, Value};
use tracing::debug;

/// Layout of the EXIF `DateTimeOriginal` tag.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Long-form display layout, e.g. "Saturday, June 1, 2024 at 3:04 PM".
const DISPLAY_DATETIME_FORMAT: &str = "%A, %B %-d, %Y at %-I:%M %p";

pub const UNKNOWN_DATE: &str = "Unknown Date";

/// Opaque metadata-extraction capability: raw bytes in, tag table out.
pub trait TagReader {
    fn read_tags(&self, bytes: &[u8]) -> Result<TagTable, ExtractError>;
}

/// Default [`TagReader`] backed by kamadak-exif.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTagReader;

impl TagReader for ExifTagReader {
    fn read_tags(&self, bytes: &[u8]) -> Result<TagTable, ExtractError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let exif_data = exif::Reader::new().read_from_container(&mut cursor)?;
        Ok(extract_all_exif(&exif_data))
    }
}

/// Result of running the extractor over one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub location: Option<GeoTag>,
    pub captured_at: Option<NaiveDateTime>,
    pub formatted_date: String,
    pub orientation: u8,
}

impl Extraction {
    /// What a photo gets when nothing could be decoded.
    pub fn fallback(fallback: Option<NaiveDateTime>) -> Self {
        Self {
            location: None,
            captured_at: fallback,
            formatted_date: format_capture_date(fallback),
            orientation: 1,
        }
    }
}

/// Extract geotag and capture time. `fallback` is the file's last-modified
/// time, used when the embedded capture timestamp is missing or invalid.
pub fn extract<R: TagReader + ?Sized>(
    reader: &R,
    bytes: &[u8],
    fallback: Option<NaiveDateTime>,
) -> Extraction {
    let tags = match reader.read_tags(bytes) {
        Ok(tags) => tags,
        Err(e) => {
            debug!(error = %e, "metadata decode failed, using fallback");
            return Extraction::fallback(fallback);
        }
    };

    let captured_at = capture_time_from_tags(&tags).or(fallback);
    Extraction {
        location: gps_from_tags(&tags),
        captured_at,
        formatted_date: format_capture_date(captured_at),
        orientation: get_orientation(&tags),
    }
}

// =============================================================================
// Tag table -> derived values
// =============================================================================

/// Geotag from the GPS triples. Both latitude and longitude must be present;
/// there are no partial results.
pub fn gps_from_tags(tags: &TagTable) -> Option<GeoTag> {
    let lat = dms_to_decimal(tags.get(&TAG_GPS_LATITUDE)?.as_floats()?)?;
    let lon = dms_to_decimal(tags.get(&TAG_GPS_LONGITUDE)?.as_floats()?)?;

    let lat = if reference_is(tags, TAG_GPS_LATITUDE_REF, "S") { -lat } else { lat };
    let lon = if reference_is(tags, TAG_GPS_LONGITUDE_REF, "W") { -lon } else { lon };

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        debug!(lat, lon, "GPS coordinates out of range, ignoring");
        return None;
    }
    Some(GeoTag { latitude: lat, longitude: lon })
}

/// Degrees/minutes/seconds -> decimal degrees magnitude.
/// Caller applies the sign from the hemisphere reference.
pub fn dms_to_decimal(dms: &[f64]) -> Option<f64> {
    match dms {
        [deg, min, sec, ..] => Some(deg + min / 60.0 + sec / 3600.0),
        _ => None,
    }
}

fn reference_is(tags: &TagTable, tag: u16, hemisphere: &str) -> bool {
    tags.get(&tag)
        .and_then(ExifValue::as_str)
        .is_some_and(|r| r.trim().eq_ignore_ascii_case(hemisphere))
}

/// Parse `DateTimeOriginal` ("YYYY:MM:DD HH:MM:SS").
pub fn capture_time_from_tags(tags: &TagTable) -> Option<NaiveDateTime> {
    let raw = tags.get(&TAG_DATETIME_ORIGINAL)?.as_str()?;
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT).ok()
}

/// Orientation from tags (returns 1 if not found or invalid)
pub fn get_orientation(tags: &TagTable) -> u8 {
    match tags.get(&TAG_ORIENTATION).and_then(ExifValue::as_u32) {
        Some(v @ 1..=8) => v as u8,
        _ => 1,
    }
}

pub fn format_capture_date(captured_at: Option<NaiveDateTime>) -> String {
    match captured_at {
        Some(dt) => dt.format(DISPLAY_DATETIME_FORMAT).to_string(),
        None => UNKNOWN_DATE.to_string(),
    }
}

// =============================================================================
// kamadak-exif -> TagTable
// =============================================================================

/// Flatten all EXIF fields into a tag table.
/// Skips the thumbnail IFD, interoperability tags and binary blobs.
pub fn extract_all_exif(exif_data: &exif::Exif) -> TagTable {
    let mut map = TagTable::new();

    for field in exif_data.fields() {
        let tag_id = field.tag.number();

        if is_excluded_tag(tag_id) || field.ifd_num == In::THUMBNAIL {
            continue;
        }
        // Interop tag numbers overlap the GPS range
        if field.tag.context() == Context::Interop {
            continue;
        }

        let value = match &field.value {
            Value::Byte(v) => match v.len() {
                1 => ExifValue::Byte(v[0]),
                n if n <= MAX_TAG_SIZE => ExifValue::Bytes(v.clone()),
                _ => continue,
            },

            Value::Short(v) => match v.len() {
                1 => ExifValue::Short(v[0]),
                n if n <= MAX_TAG_SIZE / 2 => ExifValue::Shorts(v.clone()),
                _ => continue,
            },

            Value::Long(v) if v.len() == 1 => ExifValue::Long(v[0]),

            Value::SLong(v) if v.len() == 1 => ExifValue::Signed(v[0]),

            Value::Rational(v) => {
                let floats: Vec<f64> =
                    v.iter().filter(|r| r.denom != 0).map(|r| r.to_f64()).collect();
                // A zero denominator anywhere invalidates the whole value
                if floats.is_empty() || floats.len() != v.len() {
                    continue;
                }
                if floats.len() == 1 { ExifValue::Float(floats[0]) } else { ExifValue::Floats(floats) }
            }

            Value::SRational(v) => {
                let floats: Vec<f64> =
                    v.iter().filter(|r| r.denom != 0).map(|r| r.to_f64()).collect();
                if floats.is_empty() || floats.len() != v.len() {
                    continue;
                }
                if floats.len() == 1 { ExifValue::Float(floats[0]) } else { ExifValue::Floats(floats) }
            }

            Value::Ascii(v) => {
                let s: String = v
                    .iter()
                    .filter_map(|bytes| std::str::from_utf8(bytes).ok())
                    .collect::<Vec<_>>()
                    .join("")
                    .trim()
                    .replace('\0', "");

                if s.is_empty() || s.len() > MAX_TAG_SIZE {
                    continue;
                }
                ExifValue::String(s)
            }

            _ => continue,
        };

        map.insert(tag_id, value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn gps_tags(lat: [f64; 3], lat_ref: &str, lon: [f64; 3], lon_ref: &str) -> TagTable {
        let mut tags = TagTable::new();
        tags.insert(TAG_GPS_LATITUDE, ExifValue::Floats(lat.to_vec()));
        tags.insert(TAG_GPS_LATITUDE_REF, ExifValue::String(lat_ref.into()));
        tags.insert(TAG_GPS_LONGITUDE, ExifValue::Floats(lon.to_vec()));
        tags.insert(TAG_GPS_LONGITUDE_REF, ExifValue::String(lon_ref.into()));
        tags
    }

    struct FixedReader(Option<TagTable>);

    impl TagReader for FixedReader {
        fn read_tags(&self, _bytes: &[u8]) -> Result<TagTable, ExtractError> {
            self.0.clone().ok_or_else(|| ExtractError::Decode(exif::Error::NotFound("test")))
        }
    }

    #[test]
    fn test_dms_to_decimal() {
        // 48° 51' 24" (Paris approximate)
        let decimal = dms_to_decimal(&[48.0, 51.0, 24.0]).unwrap();
        assert!((decimal - 48.8567).abs() < 0.001);
        assert!(dms_to_decimal(&[48.0, 51.0]).is_none());
    }

    #[test]
    fn test_south_west_negates() {
        let triples = [([37.0, 46.0, 29.64], [122.0, 25.0, 9.84]), ([0.0, 0.0, 1.0], [179.0, 59.0, 0.0])];
        for (lat, lon) in triples {
            let ne = gps_from_tags(&gps_tags(lat, "N", lon, "E")).unwrap();
            let sw = gps_from_tags(&gps_tags(lat, "S", lon, "W")).unwrap();
            assert_eq!(sw.latitude, -ne.latitude);
            assert_eq!(sw.longitude, -ne.longitude);
        }
    }

    #[test]
    fn test_reference_is_case_and_space_insensitive() {
        let tag = gps_from_tags(&gps_tags([10.0, 0.0, 0.0], " s ", [20.0, 0.0, 0.0], "w")).unwrap();
        assert_eq!(tag.latitude, -10.0);
        assert_eq!(tag.longitude, -20.0);
    }

    #[test]
    fn test_missing_longitude_is_no_geotag() {
        let mut tags = gps_tags([10.0, 0.0, 0.0], "N", [20.0, 0.0, 0.0], "E");
        tags.remove(&TAG_GPS_LONGITUDE);
        assert!(gps_from_tags(&tags).is_none());
    }

    #[test]
    fn test_capture_time_and_fallback() {
        let mut tags = TagTable::new();
        tags.insert(TAG_DATETIME_ORIGINAL, ExifValue::String("2024:06:01 15:04:05".into()));
        let fallback = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0);

        let found = extract(&FixedReader(Some(tags)), b"", fallback);
        assert_eq!(found.formatted_date, "Saturday, June 1, 2024 at 3:04 PM");
        assert!(found.location.is_none());

        let mut bad = TagTable::new();
        bad.insert(TAG_DATETIME_ORIGINAL, ExifValue::String("2024:13:45 99:00:00".into()));
        let fell_back = extract(&FixedReader(Some(bad)), b"", fallback);
        assert_eq!(fell_back.captured_at, fallback);
        assert_eq!(fell_back.formatted_date, "Wednesday, January 1, 2020 at 12:00 AM");
    }

    #[test]
    fn test_decode_failure_degrades() {
        let result = extract(&FixedReader(None), b"garbage", None);
        assert_eq!(result, Extraction::fallback(None));
        assert_eq!(result.formatted_date, UNKNOWN_DATE);
    }

    #[test]
    fn test_kamadak_reader_rejects_non_image() {
        assert!(ExifTagReader.read_tags(b"definitely not a photo").is_err());
        let result = extract(&ExifTagReader, b"definitely not a photo", None);
        assert!(result.location.is_none());
    }

    #[test]
    fn test_kamadak_reader_decodes_gps() {
        use exif::{Field, Rational, Tag};

        let rats = |d: u32, m: u32, s: (u32, u32)| {
            Value::Rational(vec![
                Rational { num: d, denom: 1 },
                Rational { num: m, denom: 1 },
                Rational { num: s.0, denom: s.1 },
            ])
        };
        let ascii = |s: &str| Value::Ascii(vec![s.as_bytes().to_vec()]);
        let fields = [
            Field { tag: Tag::GPSLatitudeRef, ifd_num: In::PRIMARY, value: ascii("N") },
            Field { tag: Tag::GPSLatitude, ifd_num: In::PRIMARY, value: rats(37, 46, (2964, 100)) },
            Field { tag: Tag::GPSLongitudeRef, ifd_num: In::PRIMARY, value: ascii("W") },
            Field { tag: Tag::GPSLongitude, ifd_num: In::PRIMARY, value: rats(122, 25, (984, 100)) },
            Field { tag: Tag::DateTimeOriginal, ifd_num: In::PRIMARY, value: ascii("2023:07:04 09:30:00") },
        ];
        let mut writer = exif::experimental::Writer::new();
        for field in &fields {
            writer.push_field(field);
        }
        let mut tiff = std::io::Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();

        let result = extract(&ExifTagReader, tiff.get_ref(), None);
        let location = result.location.unwrap();
        assert!((location.latitude - 37.7749).abs() < 1e-4);
        assert!((location.longitude + 122.4194).abs() < 1e-4);
        assert_eq!(result.formatted_date, "Tuesday, July 4, 2023 at 9:30 AM");
    }

    #[test]
    fn test_orientation_range() {
        let mut tags = TagTable::new();
        assert_eq!(get_orientation(&tags), 1);
        tags.insert(TAG_ORIENTATION, ExifValue::Short(6));
        assert_eq!(get_orientation(&tags), 6);
        tags.insert(TAG_ORIENTATION, ExifValue::Short(42));
        assert_eq!(get_orientation(&tags), 1);
    }
}
