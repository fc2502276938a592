// Application settings
// Loaded from ~/.config/stockrecon/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that replaces the settings file path.
pub const CONFIG_ENV: &str = "STOCKRECON_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Reconciliation
    /// Year used when neither the request nor the stock file name gives one.
    #[serde(rename = "recon.defaultYear")]
    pub default_year: i32,

    /// Unit id used when the CLI's `--unit` is omitted.
    #[serde(rename = "recon.defaultUnit", skip_serializing_if = "Option::is_none")]
    pub default_unit: Option<String>,

    // Export
    #[serde(rename = "export.directory", skip_serializing_if = "Option::is_none")]
    pub export_directory: Option<PathBuf>,

    #[serde(rename = "export.bom")]
    pub export_bom: bool,

    // Logging
    /// `EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(rename = "log.filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_year: 2025,
            default_unit: None,
            export_directory: None,
            export_bom: true,
            log_filter: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stockrecon");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from an explicit file. Errors fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring `//` comment lines.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Year used when the request and the stock file name give none
    "recon.defaultYear": 2025,

    // Unit used when --unit is omitted, e.g. "fath1"
    // "recon.defaultUnit": "fath1",

    // Export
    // "export.directory": "/path/to/exports",
    "export.bom": true,

    // Log filter (RUST_LOG overrides), e.g. "info" or "stockrecon_recon=debug"
    "log.filter": "warn"
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
