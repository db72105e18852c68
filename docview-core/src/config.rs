use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BUNDLED_DOCUMENT: &str = "sample.pdf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode config")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub bundled_document: String,
    pub assets_dir: PathBuf,
    /// Log document metadata and outline after every load.
    pub diagnostics: bool,
    pub log_level: Option<String>,
    pub layout: LayoutOptions,
    pub permissions: PermissionConfig,
    pub picker: PickerConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bundled_document: DEFAULT_BUNDLED_DOCUMENT.to_owned(),
            assets_dir: PathBuf::from("assets"),
            diagnostics: cfg!(debug_assertions),
            log_level: None,
            layout: LayoutOptions::default(),
            permissions: PermissionConfig::default(),
            picker: PickerConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`ViewerConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn bundled_asset_path(&self) -> PathBuf {
        self.assets_dir.join(&self.bundled_document)
    }
}

/// Layout of the rendering surface. Fixed for the lifetime of one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub spacing: u32,
    pub spacing_top: u32,
    pub spacing_bottom: u32,
    pub auto_spacing: bool,
    pub annotation_rendering: bool,
    pub background: [u8; 3],
    pub density: f32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            spacing: 10,
            spacing_top: 0,
            spacing_bottom: 60,
            auto_spacing: false,
            annotation_rendering: true,
            background: [0xcc, 0xcc, 0xcc],
            density: 1.0,
        }
    }
}

impl LayoutOptions {
    /// Where the scroll handle stops while the search controls cover the bottom edge.
    pub fn scroll_offset_stop_at(&self) -> u32 {
        let scaled = (self.spacing_bottom as f32 * self.density).round();
        if !scaled.is_finite() || scaled <= 0.0 {
            0
        } else if scaled > u32::MAX as f32 {
            u32::MAX
        } else {
            scaled as u32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionPolicy {
    Granted,
    Denied,
    #[default]
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PermissionConfig {
    pub read_external_storage: PermissionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub enabled: bool,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
