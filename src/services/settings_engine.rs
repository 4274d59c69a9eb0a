// smartmarks Settings Engine
// Loads, saves, updates and resets the client settings.
// Settings are stored as JSON at the platform config path; environment
// variables override the file after loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::AppSettings;

pub const ENV_BACKEND_URL: &str = "SMARTMARKS_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "SMARTMARKS_ANON_KEY";
pub const ENV_REALTIME_URL: &str = "SMARTMARKS_REALTIME_URL";
pub const ENV_OAUTH_PROVIDER: &str = "SMARTMARKS_OAUTH_PROVIDER";
pub const ENV_REDIRECT_TO: &str = "SMARTMARKS_REDIRECT_TO";
pub const ENV_DATA_DIR: &str = "SMARTMARKS_DATA_DIR";
pub const ENV_SESSION_PASSPHRASE: &str = "SMARTMARKS_SESSION_PASSPHRASE";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError>;
    fn reset(&mut self) -> Result<(), SettingsError>;
    fn get_config_path(&self) -> &str;
}

/// Settings engine persisting `AppSettings` as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Uses `path_override` when given, otherwise `settings.json` in the
    /// platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override.unwrap_or_else(|| {
            platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string()
        });
        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// Loads the file, then applies `.env` and process environment overrides.
    ///
    /// Overrides change the in-memory settings only; `load_with_env` itself
    /// never writes the file.
    pub fn load_with_env(&mut self) -> Result<AppSettings, SettingsError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
        }
        self.load()?;
        self.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(self.settings.clone())
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let s = &mut self.settings;
        if let Some(v) = get(ENV_BACKEND_URL) {
            s.backend.url = v;
        }
        if let Some(v) = get(ENV_ANON_KEY) {
            s.backend.anon_key = v;
        }
        if let Some(v) = get(ENV_REALTIME_URL) {
            s.backend.realtime_url = Some(v);
        }
        if let Some(v) = get(ENV_OAUTH_PROVIDER) {
            s.auth.provider = v;
        }
        if let Some(v) = get(ENV_REDIRECT_TO) {
            s.auth.redirect_to = v;
        }
        if let Some(v) = get(ENV_DATA_DIR) {
            s.storage.data_dir = Some(v);
        }
        if let Some(v) = get(ENV_SESSION_PASSPHRASE) {
            s.storage.passphrase = v;
        }
    }

    /// Directory for the session database.
    pub fn data_dir(&self) -> PathBuf {
        match &self.settings.storage.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => platform::get_data_dir(),
        }
    }
}

impl SettingsEngineTrait for SettingsEngine {
    /// Missing file yields defaults; a malformed file is an error.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);
        if !path.exists() {
            self.settings = AppSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;
        self.settings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        tracing::debug!(path = %self.config_path, "settings loaded");
        Ok(self.settings.clone())
    }

    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;
        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Updates one value by dot path, e.g. `"backend.anon_key"` or
    /// `"realtime.owner_filter"`, then saves.
    ///
    /// The key must already exist; the new value must deserialize.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        let parts: Vec<&str> = key.split('.').collect();
        if key.is_empty() || parts.iter().any(|p| p.is_empty()) {
            return Err(SettingsError::InvalidKey(format!("Malformed key '{}'", key)));
        }

        let mut json_value = serde_json::to_value(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return Err(SettingsError::InvalidKey("Key cannot be empty".to_string())),
        };
        let mut current = &mut json_value;
        for part in parents {
            current = current
                .get_mut(*part)
                .filter(|v| v.is_object())
                .ok_or_else(|| SettingsError::InvalidKey(format!("Key '{}' not found in settings", key)))?;
        }
        match current {
            serde_json::Value::Object(map) if map.contains_key(*last) => {
                map.insert(last.to_string(), value);
            }
            _ => {
                return Err(SettingsError::InvalidKey(format!(
                    "Key '{}' not found in settings",
                    key
                )))
            }
        }

        self.settings = serde_json::from_value(json_value).map_err(|e| {
            SettingsError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;
        self.save()
    }

    fn reset(&mut self) -> Result<(), SettingsError> {
        self.settings = AppSettings::default();
        self.save()
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
