/*
 * Persisted user settings: the ignore patterns (one per line, gitignore style)
 * and the depth from which the tree starts out collapsed. Settings are stored as
 * JSON in the platform's local configuration directory for the application.
 *
 * Like the rest of core, storage sits behind a trait (`SettingsManagerOperations`)
 * so the presenter can be tested against an in-memory mock.
 */
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "RepoPicker";
const SETTINGS_FILENAME: &str = "settings.json";
const DEFAULT_CLOSE_DEPTH: usize = 1;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoConfigDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Settings I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Settings file format error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine configuration directory for settings")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            ConfigError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ignore_patterns: String,
    pub close_depth: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ignore_patterns: String::new(),
            close_depth: Some(DEFAULT_CLOSE_DEPTH),
        }
    }
}

pub trait SettingsManagerOperations: Send + Sync {
    fn load_settings(&self) -> Result<Settings>;
    fn save_settings(&self, settings: &Settings) -> Result<()>;
}

/*
 * Retrieves the application's local (non-roaming) configuration directory,
 * creating it if necessary. Returns `None` if the platform has no suitable
 * location or it cannot be created.
 */
pub fn app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!("Settings: Failed to create config directory {config_path:?}: {e}");
                return None;
            }
            log::debug!("Settings: Created config directory {config_path:?}.");
        }
        Some(config_path.to_path_buf())
    })
}

pub struct CoreSettingsManager {
    config_dir: Option<PathBuf>,
}

impl CoreSettingsManager {
    pub fn new() -> Self {
        CoreSettingsManager {
            config_dir: app_config_local_dir(APP_NAME),
        }
    }

    pub fn with_config_dir(config_dir: &Path) -> Self {
        CoreSettingsManager {
            config_dir: Some(config_dir.to_path_buf()),
        }
    }

    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    fn settings_path(&self) -> Result<PathBuf> {
        self.config_dir
            .as_ref()
            .map(|dir| dir.join(SETTINGS_FILENAME))
            .ok_or(ConfigError::NoConfigDirectory)
    }
}

impl Default for CoreSettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsManagerOperations for CoreSettingsManager {
    // A missing settings file is not an error; it yields the defaults.
    fn load_settings(&self) -> Result<Settings> {
        let file_path = self.settings_path()?;
        if !file_path.exists() {
            log::debug!("CoreSettingsManager: {file_path:?} does not exist, using defaults.");
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(&file_path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        log::debug!("CoreSettingsManager: Loaded settings from {file_path:?}.");
        Ok(settings)
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        let file_path = self.settings_path()?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&file_path, json)?;
        log::debug!("CoreSettingsManager: Saved settings to {file_path:?}.");
        Ok(())
    }
}
