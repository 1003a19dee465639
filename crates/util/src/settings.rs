//! Settings for the flowref CLI/TUI.
//!
//! Settings live in a small JSON file in the standard configuration
//! directory (`~/.config/flowref/settings.json` on most platforms). A missing
//! file yields defaults; a file that cannot be parsed is reported with a
//! warning and also yields defaults, so a broken settings file never blocks
//! the tools.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{expand_tilde, resolve_against};

/// Environment variable allowing callers to override the settings file path.
pub const SETTINGS_PATH_ENV: &str = "FLOWREF_CONFIG_PATH";

/// Default filename for the JSON payload.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Error surfaced when reading settings fails.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// I/O failure other than a missing file.
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persisted settings values.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct SettingsPayload {
    /// Extra action catalog layered over the built-in actions.
    #[serde(default)]
    pub catalog_path: Option<String>,
    /// Flat key → text dictionary for display names.
    #[serde(default)]
    pub translations_path: Option<String>,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// Settings together with the file they were read from.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    path: PathBuf,
    payload: SettingsPayload,
}

impl Settings {
    /// Loads settings from `$FLOWREF_CONFIG_PATH` or the default location.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(default_settings_path())
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let payload = load_payload(&path)?;
        Ok(Self { path, payload })
    }

    /// Path of the underlying JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Catalog path, tilde-expanded and relative to the settings file.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.payload.catalog_path.as_deref().map(|path| resolve_against(self.path.parent(), path))
    }

    /// Translations path, tilde-expanded and relative to the settings file.
    pub fn translations_path(&self) -> Option<PathBuf> {
        self.payload.translations_path.as_deref().map(|path| resolve_against(self.path.parent(), path))
    }

    pub fn log_filter(&self) -> Option<&str> {
        self.payload.log_filter.as_deref().map(str::trim).filter(|filter| !filter.is_empty())
    }
}

/// `$FLOWREF_CONFIG_PATH` when set, `<config_dir>/flowref/settings.json` otherwise.
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(SETTINGS_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowref")
        .join(SETTINGS_FILE_NAME)
}

fn load_payload(path: &Path) -> Result<SettingsPayload, SettingsError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(payload) => {
                debug!(path = %path.display(), "Loaded settings");
                Ok(payload)
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse settings file; using defaults"
                );
                Ok(SettingsPayload::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(SettingsPayload::default()),
        Err(error) => Err(SettingsError::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.payload, SettingsPayload::default());
        assert!(settings.catalog_path().is_none());
        assert!(settings.log_filter().is_none());
    }

    #[test]
    fn invalid_json_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.payload, SettingsPayload::default());
        assert_eq!(settings.path(), path.as_path());
    }

    #[test]
    fn relative_paths_are_anchored_at_the_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "catalog_path": "catalog.yaml", "translations_path": "/opt/i18n/en.json", "log_filter": " debug " }"#,
        )
        .unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.catalog_path(), Some(dir.path().join("catalog.yaml")));
        assert_eq!(settings.translations_path(), Some(PathBuf::from("/opt/i18n/en.json")));
        assert_eq!(settings.log_filter(), Some("debug"));
    }

    #[test]
    fn default_path_honors_env_override() {
        let override_path = "~/custom/settings.json";
        temp_env::with_var(SETTINGS_PATH_ENV, Some(override_path), || {
            assert_eq!(default_settings_path(), expand_tilde(override_path));
        });
        temp_env::with_var(SETTINGS_PATH_ENV, Some("   "), || {
            assert!(default_settings_path().ends_with("flowref/settings.json"));
        });
    }
}
