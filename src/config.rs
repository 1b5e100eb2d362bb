// Configuration file handling (photomap.toml in the user config dir).
use crate::db::DEFAULT_MAP_SIZE;
use crate::error::ConfigError;
use crate::photo::GeoTag;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "photomap.toml";
const STORE_DIR_NAME: &str = "photomap_store";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Defaults to `<cache dir>/photomap_store`
    pub path: Option<PathBuf>,
    pub map_size: usize,
    /// Deleting a photo also removes its stored record
    pub purge_on_delete: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: None, map_size: DEFAULT_MAP_SIZE, purge_on_delete: true }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| dirs::cache_dir().map(|d| d.join(STORE_DIR_NAME)))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MapConfig {
    pub default_zoom: f64,
    /// Padding in pixels around fitted bounds
    pub fit_padding: f64,
    /// Fitting never zooms in further than this
    pub max_zoom: f64,
    pub default_center: GeoTag,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_zoom: 9.0,
            fit_padding: 50.0,
            max_zoom: 15.0,
            default_center: GeoTag::new(40.0, -74.5),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self { enabled: false, endpoint: "https://ipapi.co/json/".to_string(), timeout_secs: 5 }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImportConfig {
    pub extensions: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { extensions: ["jpeg", "jpg", "png", "heic"].iter().map(|s| s.to_string()).collect() }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl Config {
    /// Load from the default location, creating the file with defaults
    /// if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&config_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io { path: config_path.to_path_buf(), source };

        if !config_path.exists() {
            info!(path = %config_path.display(), "config file does not exist, creating default");
            let cfg = Config::default();
            cfg.save_to(config_path)?;
            return Ok(cfg);
        }

        let content = fs::read_to_string(config_path).map_err(io_err)?;
        debug!(path = %config_path.display(), "loading config");
        let cfg: Config = toml::from_str(&content)?;

        // Write back defaults if sections are missing
        let raw_value: toml::Table = toml::from_str(&content)?;
        let missing: Vec<&str> = ["store", "map", "geolocation", "import"]
            .into_iter()
            .filter(|section| !raw_value.contains_key(*section))
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "writing back default config sections");
            cfg.save_to(config_path)?;
        }
        Ok(cfg)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: config_path.to_path_buf(), source };
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(config_path, toml_str).map_err(io_err)
    }
}
