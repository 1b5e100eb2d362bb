// Error types shared across the library.
// Extraction errors never leave the extractor; store and config errors are
// surfaced to the session, which turns them into notices.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no EXIF container found: {0}")]
    Decode(#[from] exif::Error),
    #[error("file could not be read: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lmdb: {0}")]
    Lmdb(#[from] lmdb::Error),
    #[error("record encoding: {0}")]
    Encoding(#[from] postcard::Error),
    #[error("store directory {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid record {id:?}: {reason}")]
    InvalidRecord { id: String, reason: &'static str },
    #[error("corrupt record {id:?}: {reason}")]
    Corrupt { id: String, reason: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory found")]
    NoConfigDir,
    #[error("config io {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum GeolocateError {
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geolocation response out of range: {latitude}, {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}
