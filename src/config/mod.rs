//! Settings management for PasteBox
//!
//! Settings live in a TOML file. The file is located by, in order: an
//! explicit path, the `PASTEBOX_CONFIG` environment variable, then
//! `<config dir>/pastebox/config.toml`. Without a file the defaults apply.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hotkey::HotkeyBinding;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PASTEBOX_CONFIG";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading or writing the config file
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding error
    #[error("Failed to encode TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// User settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Number of history items to keep (1 to 1000)
    #[serde(default = "default_max_history_items")]
    pub max_history_items: usize,

    #[serde(default)]
    pub launch_at_login: bool,

    #[serde(default = "default_true")]
    pub show_in_dock: bool,

    #[serde(default = "default_true")]
    pub enable_sounds: bool,

    /// Items older than this many days are removed by scheduled cleanup
    #[serde(default = "default_auto_delete_after_days")]
    pub auto_delete_after_days: u32,

    /// Bundle identifiers whose copies are not captured
    #[serde(default)]
    pub excluded_apps: BTreeSet<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Hotkey configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// Hotkey to show clipboard history
    #[serde(default = "default_show_history")]
    pub show_history: String,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the history file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_max_history_items() -> usize {
    crate::MAX_HISTORY_ITEMS
}

fn default_true() -> bool {
    true
}

fn default_auto_delete_after_days() -> u32 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_show_history() -> String {
    "Cmd+Shift+V".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("pastebox"))
        .unwrap_or_else(|| PathBuf::from("~/.local/share/pastebox"))
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            show_history: default_show_history(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_history_items: default_max_history_items(),
            launch_at_login: false,
            show_in_dock: true,
            enable_sounds: true,
            auto_delete_after_days: default_auto_delete_after_days(),
            excluded_apps: BTreeSet::new(),
            log_level: default_log_level(),
            hotkey: HotkeyConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => {
                let mut settings = Self::default();
                settings.expand_paths();
                Ok(settings)
            }
        }
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_toml(&contents)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = toml::from_str(toml_str)?;
        settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pastebox").join("config.toml"))
    }

    /// Config file to use: `PASTEBOX_CONFIG`, then the default location, if they exist
    pub fn find_config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = expand_path(Path::new(&path));
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Check value ranges and the hotkey binding
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=crate::MAX_HISTORY_ITEMS).contains(&self.max_history_items) {
            return Err(ConfigError::Validation(format!(
                "max_history_items must be between 1 and {}",
                crate::MAX_HISTORY_ITEMS
            )));
        }

        if !(1..=3650).contains(&self.auto_delete_after_days) {
            return Err(ConfigError::Validation(
                "auto_delete_after_days must be between 1 and 3650".to_string(),
            ));
        }

        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of {}",
                LEVELS.join(", ")
            )));
        }

        HotkeyBinding::parse(&self.hotkey.show_history)
            .map_err(|e| ConfigError::Validation(format!("hotkey.show_history: {}", e)))?;

        Ok(())
    }

    /// Write settings to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Write settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(no_config_dir)?;
        self.save_to(&path)
    }

    /// Restore every value to its default
    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
        self.expand_paths();
    }

    /// Exclude an application; returns false if it was already excluded
    pub fn add_excluded_app(&mut self, bundle_id: impl Into<String>) -> bool {
        self.excluded_apps.insert(bundle_id.into())
    }

    /// Stop excluding an application; returns false if it was not excluded
    pub fn remove_excluded_app(&mut self, bundle_id: &str) -> bool {
        self.excluded_apps.remove(bundle_id)
    }

    pub fn is_app_excluded(&self, bundle_id: &str) -> bool {
        self.excluded_apps.contains(bundle_id)
    }

    /// Write a commented example config to `path`
    pub fn generate_example_config(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Example configuration file with comments
    pub fn generate_example() -> String {
        let settings = Settings::default();

        format!(
            r#"# PasteBox Configuration File
# Location: ~/.config/pastebox/config.toml

# Number of clipboard items to keep (1-1000)
max_history_items = {}

# Start PasteBox when you log in
launch_at_login = {}
# Show the app icon in the Dock
show_in_dock = {}
# Play a sound when an item is captured
enable_sounds = {}

# Remove items older than this many days
auto_delete_after_days = {}

# Bundle identifiers of apps whose copies are never captured
excluded_apps = ["com.agilebits.onepassword7"]

# Logging level (trace, debug, info, warn, error)
log_level = "{}"

# Hotkey configuration
[hotkey]
# Show clipboard history
show_history = "{}"

# Storage settings
[storage]
# Directory holding clipboard_history.json
data_dir = '{}'
"#,
            settings.max_history_items,
            settings.launch_at_login,
            settings.show_in_dock,
            settings.enable_sounds,
            settings.auto_delete_after_days,
            settings.log_level,
            settings.hotkey.show_history,
            settings.storage.data_dir.display(),
        )
    }

    fn expand_paths(&mut self) {
        self.storage.data_dir = expand_path(&self.storage.data_dir);
    }
}

/// Shared settings service
///
/// Holds the current settings and the file they came from, if any.
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<Settings>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// Load from `path` if given, otherwise from the default locations
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (settings, path) = match path {
            Some(path) => (Settings::load_from_path(path)?, Some(path.to_path_buf())),
            None => {
                let found = Settings::find_config_path();
                let settings = match &found {
                    Some(path) => Settings::load_from_path(path)?,
                    None => Settings::load()?,
                };
                (settings, found.or_else(Settings::default_path))
            }
        };

        Ok(Self {
            settings: RwLock::new(settings),
            path,
        })
    }

    /// Store that never touches the filesystem
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            path: None,
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of the current settings
    pub fn get(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Modify settings in place; the result is validated before it is kept
    pub fn update<F>(&self, f: F) -> Result<Settings, ConfigError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.settings.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = guard.clone();
        f(&mut updated);
        updated.validate()?;
        *guard = updated.clone();
        Ok(updated)
    }

    /// Write the current settings to the backing file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.path.as_deref().ok_or_else(no_config_dir)?;
        self.get().save_to(path)
    }
}

fn no_config_dir() -> ConfigError {
    ConfigError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "Could not find config directory",
    ))
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_history_items, 1000);
        assert_eq!(settings.auto_delete_after_days, 30);
        assert!(!settings.launch_at_login);
        assert!(settings.show_in_dock);
        assert!(settings.enable_sounds);
        assert!(settings.excluded_apps.is_empty());
        assert_eq!(settings.hotkey.show_history, "Cmd+Shift+V");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let toml_str = r#"
            max_history_items = 250
            auto_delete_after_days = 7
            excluded_apps = ["com.apple.keychainaccess"]

            [hotkey]
            show_history = "Cmd+Option+V"

            [storage]
            data_dir = "~/clips"
        "#;

        let settings = Settings::from_toml(toml_str).unwrap();
        assert_eq!(settings.max_history_items, 250);
        assert_eq!(settings.auto_delete_after_days, 7);
        assert!(settings.is_app_excluded("com.apple.keychainaccess"));
        assert_eq!(settings.hotkey.show_history, "Cmd+Option+V");
        assert!(!settings.storage.data_dir.to_string_lossy().starts_with('~'));
        assert!(settings.enable_sounds);
    }

    #[test]
    fn test_validation_ranges() {
        assert!(Settings::from_toml("max_history_items = 0").is_err());
        assert!(Settings::from_toml("max_history_items = 1001").is_err());
        assert!(Settings::from_toml("auto_delete_after_days = 0").is_err());
        assert!(Settings::from_toml("log_level = \"loud\"").is_err());
        assert!(Settings::from_toml("[hotkey]\nshow_history = \"Cmd+Nope\"").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.max_history_items = 42;
        settings.add_excluded_app("com.example.secret");
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from_path(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_excluded_apps() {
        let mut settings = Settings::default();
        assert!(settings.add_excluded_app("com.a"));
        assert!(!settings.add_excluded_app("com.a"));
        assert!(settings.is_app_excluded("com.a"));
        assert!(settings.remove_excluded_app("com.a"));
        assert!(!settings.remove_excluded_app("com.a"));
    }

    #[test]
    fn test_reset_to_defaults() {
        let mut settings = Settings::default();
        settings.enable_sounds = false;
        settings.add_excluded_app("com.a");
        settings.reset_to_defaults();
        assert!(settings.enable_sounds);
        assert!(settings.excluded_apps.is_empty());
    }

    #[test]
    fn test_generate_example_parses() {
        let example = Settings::generate_example();
        assert!(example.contains("PasteBox Configuration"));
        let parsed = Settings::from_toml(&example).unwrap();
        assert_eq!(parsed.max_history_items, 1000);
        assert_eq!(parsed.excluded_apps.len(), 1);
    }

    #[test]
    fn test_generate_example_config_respects_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        Settings::generate_example_config(&path, false).unwrap();
        assert!(Settings::generate_example_config(&path, false).is_err());
        Settings::generate_example_config(&path, true).unwrap();
    }

    #[test]
    fn test_store_update_validates() {
        let store = SettingsStore::in_memory(Settings::default());
        let updated = store.update(|s| s.max_history_items = 10).unwrap();
        assert_eq!(updated.max_history_items, 10);

        assert!(store.update(|s| s.max_history_items = 0).is_err());
        assert_eq!(store.get().max_history_items, 10);
        assert!(store.save().is_err());
    }

    #[test]
    fn test_store_load_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "enable_sounds = false").unwrap();

        let store = SettingsStore::load(Some(&path)).unwrap();
        assert!(!store.get().enable_sounds);
        assert_eq!(store.path(), Some(path.as_path()));

        store.update(|s| s.enable_sounds = true).unwrap();
        store.save().unwrap();
        assert!(Settings::load_from_path(&path).unwrap().enable_sounds);
    }
}
