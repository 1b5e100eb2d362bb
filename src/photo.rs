// src/photo.rs
//
// The Photo record and the id generator that keys it across the collection,
// the store and the marker table.

use crate::preview::PreviewHandle;
use chrono::{NaiveDateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// Decimal latitude/longitude derived from GPS metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTag {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoTag {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Map coordinate in (lng, lat) order.
    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.longitude, y: self.latitude }
    }
}

#[derive(Debug)]
pub struct Photo {
    pub id: String,
    pub name: String,
    pub preview: PreviewHandle,
    pub location: Option<GeoTag>,
    pub captured_at: Option<NaiveDateTime>,
    pub formatted_date: String,
    pub file_extension: String,
    pub mime: String,
    /// Millisecond stamp from the id; restores display order on reload.
    pub imported_at: i64,
}

impl Photo {
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }
}

/// Lower-cased extension of a file name, empty if there is none.
pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" | "heif" => "image/heic",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Generates `"{name}-{millis}"` ids. The millisecond stamp advances
/// strictly, so two same-named files in one millisecond still differ.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after stamps already in use (e.g. rehydrated records).
    pub fn observe(&mut self, millis: i64) {
        self.last_millis = self.last_millis.max(millis);
    }

    pub fn next_stamp(&mut self) -> i64 {
        self.next_stamp_at(Utc::now().timestamp_millis())
    }

    fn next_stamp_at(&mut self, now_millis: i64) -> i64 {
        let stamp = now_millis.max(self.last_millis + 1);
        self.last_millis = stamp;
        stamp
    }

    /// Returns (id, stamp).
    pub fn next_id(&mut self, name: &str) -> (String, i64) {
        let stamp = self.next_stamp();
        (format!("{}-{}", name, stamp), stamp)
    }
}
