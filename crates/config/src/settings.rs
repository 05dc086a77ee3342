// Application settings
// Loaded from ~/.config/playpen/settings.json

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum SettingsError {
    Io(String),
    Encode(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "settings IO error: {msg}"),
            Self::Encode(msg) => write!(f, "settings encode error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Copy
    /// How long "Copied!" stays visible, in ms. None = per-variant default.
    #[serde(rename = "copy.feedbackMs")]
    pub copy_feedback_ms: Option<u64>,

    // Storage
    #[serde(rename = "storage.enabled")]
    pub storage_enabled: bool,

    /// Directory for persisted step state. None = platform data dir.
    #[serde(rename = "storage.dir")]
    pub storage_dir: Option<PathBuf>,

    /// Extra scope for storage keys. None = title-only keys.
    #[serde(rename = "storage.namespace")]
    pub storage_namespace: Option<String>,

    // Editor
    #[serde(rename = "editor.tabWidth")]
    pub tab_width: usize,

    // Preview
    /// Sandbox capabilities granted on top of `allow-scripts`.
    #[serde(rename = "preview.sandbox")]
    pub preview_sandbox: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            copy_feedback_ms: None,
            storage_enabled: true,
            storage_dir: None,
            storage_namespace: None,
            tab_width: 4,
            preview_sandbox: Vec::new(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("playpen");
        config_dir.join("settings.json")
    }

    /// Platform data directory used when `storage.dir` is unset.
    pub fn default_storage_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("playpen")
            .join("state")
    }

    pub fn effective_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(Self::default_storage_dir)
    }

    pub fn copy_feedback(&self) -> Option<Duration> {
        self.copy_feedback_ms.map(Duration::from_millis)
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::write_default_file(&path) {
                log::warn!("Error writing default settings.json: {}", e);
            }
            return Self::default();
        }

        Self::load_from(&path)
    }

    /// Load from an explicit path. Unreadable or invalid files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring whole-line `//` comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to disk
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SettingsError::Encode(e.to_string()))?;

        fs::write(path, json).map_err(|e| SettingsError::Io(e.to_string()))
    }

    /// Write the commented default settings file, replacing any existing one.
    pub fn write_default_file(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let default_config = r#"{
    // "Copied!" indicator duration in ms (null = 2000 for tabs, 1500 for steps)
    "copy.feedbackMs": null,

    // Persisted step-sequence state
    "storage.enabled": true,
    "storage.dir": null,
    // Set to keep playgrounds with equal titles from sharing state
    "storage.namespace": null,

    // Editor
    "editor.tabWidth": 4,

    // Extra sandbox capabilities for previews, e.g. ["forms", "modals"]
    // allow-scripts is always granted; same-origin is refused
    "preview.sandbox": []
}
"#;

        fs::write(path, default_config).map_err(|e| SettingsError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_parses_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::write_default_file(&path).unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let s = Settings::parse(
            r#"{
            // shorter feedback
            "copy.feedbackMs": 3000,
            "preview.sandbox": ["forms"]
        }"#,
        )
        .unwrap();
        assert_eq!(s.copy_feedback(), Some(Duration::from_millis(3000)));
        assert_eq!(s.preview_sandbox, vec!["forms".to_string()]);
        assert!(s.storage_enabled);
        assert_eq!(s.tab_width, 4);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"editor.tabWidth\": \"wide\" }").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            storage_namespace: Some("docs".into()),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }
}
