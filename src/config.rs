//! Engine configuration, loaded from a JSON file with per-field defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelConfig {
    /// Regular face; when absent or unreadable the system fonts are used.
    #[serde(default)]
    pub font_file: Option<PathBuf>,
    #[serde(default)]
    pub bold_font_file: Option<PathBuf>,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_print_dpi")]
    pub print_dpi: u32,
    #[serde(default = "default_preview_size")]
    pub preview_size: [u32; 2],
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: [u32; 2],
}

fn default_font_family() -> String { "sans-serif".to_string() }
fn default_print_dpi() -> u32 { 300 }
fn default_preview_size() -> [u32; 2] { [300, 400] }
fn default_thumbnail_size() -> [u32; 2] { [150, 200] }

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            font_file: None,
            bold_font_file: None,
            font_family: default_font_family(),
            print_dpi: default_print_dpi(),
            preview_size: default_preview_size(),
            thumbnail_size: default_thumbnail_size(),
        }
    }
}

impl LabelConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
