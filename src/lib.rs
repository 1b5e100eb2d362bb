//! Photo import, geotag extraction, local persistence and map marker
//! synchronization.
//!
//! [`session::PhotoMapSession`] is the entry point: it owns the store, the
//! in-memory collection and the marker table, and is driven by a UI shell
//! (see the `photomap` binary).

pub mod chunking;
pub mod config;
pub mod db;
pub mod error;
pub mod exif_extract;
pub mod exif_types;
pub mod geolocate;
pub mod gps_map;
pub mod marker_sync;
pub mod photo;
pub mod pipeline;
pub mod preview;
pub mod session;

pub use config::Config;
pub use exif_extract::{ExifTagReader, TagReader};
pub use gps_map::{HeadlessEngine, MapEngine, MapInstance};
pub use photo::{GeoTag, Photo};
pub use pipeline::RawFile;
pub use session::{Notice, PhotoMapSession};
