use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{Config, ConfigError};

const CONFIG_DIR: &str = "config";
const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR: &str = "cadence";

/// Loads and stores the engine [`Config`] as a single JSON file.
///
/// A missing file reads as [`Config::default`]. Every write is validated
/// first and lands through a sibling `.tmp` file and a rename.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `<base>/config/config.json`.
    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let dir = base.join(CONFIG_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self::new(dir.join(CONFIG_FILE_NAME)))
    }

    /// Uses the platform configuration directory, e.g. `~/.config/cadence`.
    pub fn default_location() -> Result<Self, ConfigError> {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        fs::create_dir_all(&base)?;
        Ok(Self::new(base.join(CONFIG_FILE_NAME)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        let config = match fs::read_to_string(&self.config_path) {
            Ok(data) => serde_json::from_str::<Config>(&data).map_err(serde_error)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(err) => return Err(err.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config).map_err(serde_error)?;
        let staged = self.config_path.with_extension("json.tmp");
        write_synced(&staged, json.as_bytes())?;
        fs::rename(&staged, &self.config_path)?;
        Ok(())
    }

    /// Loads, applies `change`, then saves. Nothing is written when the
    /// changed config fails validation.
    pub fn update(&self, change: impl FnOnce(&mut Config)) -> Result<Config, ConfigError> {
        let mut config = self.load()?;
        change(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

fn serde_error(err: serde_json::Error) -> ConfigError {
    ConfigError::Serde(err.to_string())
}

fn write_synced(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
