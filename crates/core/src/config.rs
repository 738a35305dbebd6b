//! Application configuration.
//!
//! Values are layered: built-in defaults, then `<config dir>/rental/config.toml`
//! if present, then `RENTAL_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory name under the user's config and data directories.
pub const APP_DIR: &str = "rental";
/// Name of the configuration file.
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix for environment overrides, e.g. `RENTAL_DATA_DIR`.
pub const ENV_PREFIX: &str = "RENTAL";

/// Default vehicle store file name.
pub const DEFAULT_VEHICLE_STORE: &str = "vehicles.txt";
/// Default customer store file name.
pub const DEFAULT_CUSTOMER_STORE: &str = "customers.txt";
/// Default rental-record store file name.
pub const DEFAULT_RECORD_STORE: &str = "rental_records.txt";

const DEFAULT_CONFIG: &str = r#"# Vehicle rental configuration.
#
# Every key is optional. Environment variables such as RENTAL_DATA_DIR
# take precedence over this file.

# Directory holding the store files.
# data_dir = "/path/to/rental/data"

# File names of the three stores, relative to data_dir.
# vehicle_store = "vehicles.txt"
# customer_store = "customers.txt"
# record_store = "rental_records.txt"
"#;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the store files.
    pub data_dir: PathBuf,
    /// Vehicle store file name, relative to `data_dir`.
    pub vehicle_store: String,
    /// Customer store file name, relative to `data_dir`.
    pub customer_store: String,
    /// Rental-record store file name, relative to `data_dir`.
    pub record_store: String,
}

/// Resolved locations of the three stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Vehicle store.
    pub vehicles: PathBuf,
    /// Customer store.
    pub customers: PathBuf,
    /// Rental-record store.
    pub records: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            vehicle_store: DEFAULT_VEHICLE_STORE.to_string(),
            customer_store: DEFAULT_CUSTOMER_STORE.to_string(),
            record_store: DEFAULT_RECORD_STORE.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` (which may be absent) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().into_owned())?
            .set_default("vehicle_store", defaults.vehicle_store)?
            .set_default("customer_store", defaults.customer_store)?
            .set_default("record_store", defaults.record_store)?
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// Replace the data directory.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Full paths of the three stores.
    pub fn store_paths(&self) -> StorePaths {
        StorePaths {
            vehicles: self.data_dir.join(&self.vehicle_store),
            customers: self.data_dir.join(&self.customer_store),
            records: self.data_dir.join(&self.record_store),
        }
    }
}

/// Location of the configuration file under the user's config directory.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Default data directory under the user's data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Write a commented default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_default_config_at(config_path())
}

/// Write a commented default configuration file at `path` if it is missing.
pub fn ensure_default_config_at(path: impl Into<PathBuf>) -> Result<PathBuf> {
    let path = path.into();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(path)
}
