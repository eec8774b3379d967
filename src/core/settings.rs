use crate::plugins::journal::types::QualityPreset;
use crate::shared::paths::{ensure_dir, get_storage_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:6020";
pub const API_URL_ENV: &str = "JOURNAL_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub recording_quality: QualityPreset,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
    #[serde(default)]
    pub start_muted: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_autosave_delay_ms() -> u64 {
    4000
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: None,
            recording_quality: QualityPreset::default(),
            flush_interval_ms: default_flush_interval_ms(),
            autosave_delay_ms: default_autosave_delay_ms(),
            start_muted: false,
        }
    }
}

impl AppSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

/// Loads settings from the storage dir, falling back to defaults on any error.
/// `JOURNAL_API_URL` overrides the persisted API base URL.
pub fn load_settings() -> AppSettings {
    let path = get_settings_path();

    let mut settings = if path.exists() {
        load_settings_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(target: "system", "[SETTINGS] Ignoring unreadable settings: {}", e);
            AppSettings::default()
        })
    } else {
        AppSettings::default()
    };

    apply_env_overrides(&mut settings, std::env::var(API_URL_ENV).ok());
    settings
}

fn apply_env_overrides(settings: &mut AppSettings, api_url: Option<String>) {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        settings.api_base_url = url.trim().to_string();
    }
}

pub fn load_settings_from_file(path: &Path) -> Result<AppSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings(settings: &AppSettings) -> Result<(), SettingsError> {
    let storage_dir = get_storage_dir();
    ensure_dir(&storage_dir)?;
    save_settings_to_file(settings, &get_settings_path())
}

pub fn save_settings_to_file(settings: &AppSettings, path: &Path) -> Result<(), SettingsError> {
    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"apiToken":"abc"}"#).unwrap();

        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.api_token.as_deref(), Some("abc"));
        assert_eq!(settings.recording_quality, QualityPreset::P2160);
        assert_eq!(settings.flush_interval(), Duration::from_secs(1));
        assert_eq!(settings.autosave_delay(), Duration::from_secs(4));
        assert!(!settings.start_muted);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");

        let settings = AppSettings {
            recording_quality: QualityPreset::P1440,
            start_muted: true,
            ..AppSettings::default()
        };
        save_settings_to_file(&settings, &path).unwrap();

        let loaded = load_settings_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_env_override_replaces_base_url() {
        let mut settings = AppSettings::default();
        apply_env_overrides(&mut settings, Some(" https://api.example.com ".to_string()));
        assert_eq!(settings.api_base_url, "https://api.example.com");

        apply_env_overrides(&mut settings, Some("   ".to_string()));
        assert_eq!(settings.api_base_url, "https://api.example.com");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            load_settings_from_file(&path),
            Err(SettingsError::ParseError(_))
        ));
    }
}
