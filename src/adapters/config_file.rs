//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] over a single JSON document.  Missing fields
//! take their defaults (`#[serde(default)]` on [`StationConfig`]), so a
//! config written by an older firmware still loads.  Every load and save
//! goes through [`StationConfig::validate`].

use std::fs;
use std::io;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::StationConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load, falling back to defaults on first boot.  A corrupt or invalid
    /// file is reported and also replaced by defaults, so the station keeps
    /// monitoring with a known policy.
    pub fn load_or_default(&self) -> StationConfig {
        match self.load() {
            Ok(c) => c,
            Err(ConfigError::NotFound) => {
                info!("Config: {} not found, using defaults", self.path.display());
                StationConfig::default()
            }
            Err(e) => {
                warn!("Config: {} ({}), using defaults", self.path.display(), e);
                StationConfig::default()
            }
        }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<StationConfig, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ConfigError::NotFound),
            Err(_) => return Err(ConfigError::IoError),
        };
        let config: StationConfig =
            serde_json::from_slice(&bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    fn save(&self, config: &StationConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec(config).map_err(|_| ConfigError::Corrupted)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, json).map_err(|_| ConfigError::IoError)?;
        fs::rename(&tmp, &self.path).map_err(|_| ConfigError::IoError)
    }
}
