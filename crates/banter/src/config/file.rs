//! File-based configuration loading.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BanterError, Result};

/// Configuration file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Detect format from path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Parsed configuration file contents.
///
/// Every field is optional so a file only overrides what it mentions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Bot name.
    pub name: Option<String>,

    /// Bot alias.
    pub alias: Option<String>,

    /// Dialogue defaults.
    pub dialogue: Option<FileDialogueConfig>,
}

/// Dialogue section of a configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDialogueConfig {
    /// Dialogue timeout in milliseconds.
    pub timeout_ms: Option<u64>,

    /// Text dispatched on dialogue timeout.
    pub timeout_text: Option<String>,

    /// Envelope method for dialogue timeout messages.
    pub timeout_method: Option<String>,
}

impl FileConfig {
    /// Load and parse a configuration file, detecting format from extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            BanterError::config(format!("unknown config format: {}", path.display()))
        })?;
        Self::parse(&content, format)
    }

    /// Parse configuration content in the given format.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| BanterError::config(format!("invalid TOML config: {e}"))),
            ConfigFormat::Json => serde_json::from_str(content)
                .map_err(|e| BanterError::config(format!("invalid JSON config: {e}"))),
        }
    }
}
