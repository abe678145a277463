//! User configuration for MaskFE.
//!
//! Loaded from `config.toml` in the OS config directory (or an explicit path
//! passed on the command line). Every section is optional; missing keys take
//! the defaults below.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::Rgba;
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyMaskPolicy {
    /// Refuse to submit an all-black mask.
    #[default]
    Block,
    /// Log a warning and submit anyway.
    Warn,
    /// Submit silently; the generator is told to change nothing.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub default_diameter: u32,
    pub min_diameter: u32,
    pub max_diameter: u32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            default_diameter: 30,
            min_diameter: 10,
            max_diameter: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of snapshots kept for undo.
    pub depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { depth: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// RGBA highlight painted on the drawing surface.
    pub color: [u8; 4],
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            color: [255, 59, 48, 128],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub empty_mask_policy: EmptyMaskPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskerConfig {
    pub brush: BrushConfig,
    pub history: HistoryConfig,
    pub preview: PreviewConfig,
    pub submission: SubmissionConfig,
    pub log: LogConfig,
}

impl MaskerConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("MaskFE")
            .join("config.toml")
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when `None`.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content)
                .map_err(|source| ConfigError::Parse { path, source }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(content)?;
        Ok(config.validated())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Repair inconsistent values, logging each repair.
    pub fn validated(mut self) -> Self {
        let brush = &mut self.brush;
        if brush.min_diameter == 0 {
            warn!("brush.min_diameter must be at least 1; using 1");
            brush.min_diameter = 1;
        }
        if brush.min_diameter > brush.max_diameter {
            warn!(
                "brush.min_diameter {} exceeds max_diameter {}; swapping",
                brush.min_diameter, brush.max_diameter
            );
            std::mem::swap(&mut brush.min_diameter, &mut brush.max_diameter);
        }
        let clamped = brush
            .default_diameter
            .clamp(brush.min_diameter, brush.max_diameter);
        if clamped != brush.default_diameter {
            warn!(
                "brush.default_diameter {} outside {}..={}; using {}",
                brush.default_diameter, brush.min_diameter, brush.max_diameter, clamped
            );
            brush.default_diameter = clamped;
        }

        // A fully transparent highlight would leave painted pixels at alpha 0,
        // invisible to the mask compiler.
        if self.preview.color[3] == 0 {
            warn!("preview.color alpha of 0 would hide strokes from the mask; using 1");
            self.preview.color[3] = 1;
        }

        if self.log.level.parse::<LevelFilter>().is_err() {
            warn!("unknown log.level {:?}; using info", self.log.level);
            self.log.level = "info".to_string();
        }
        self
    }

    pub fn preview_color(&self) -> Rgba<u8> {
        Rgba(self.preview.color)
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log.level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = MaskerConfig::from_toml("").unwrap();
        assert_eq!(config, MaskerConfig::default());
        assert_eq!(config.brush.default_diameter, 30);
        assert_eq!(config.history.depth, 10);
        assert_eq!(config.submission.empty_mask_policy, EmptyMaskPolicy::Block);
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = MaskerConfig::from_toml(
            "[brush]\ndefault_diameter = 50\n\n[submission]\nempty_mask_policy = \"warn\"\n",
        )
        .unwrap();
        assert_eq!(config.brush.default_diameter, 50);
        assert_eq!(config.brush.max_diameter, 100);
        assert_eq!(config.submission.empty_mask_policy, EmptyMaskPolicy::Warn);
    }

    #[test]
    fn inconsistent_values_are_repaired() {
        let config = MaskerConfig::from_toml(
            "[brush]\nmin_diameter = 80\nmax_diameter = 20\ndefault_diameter = 5\n\n\
             [preview]\ncolor = [0, 0, 255, 0]\n\n[log]\nlevel = \"loud\"\n",
        )
        .unwrap();
        assert_eq!(config.brush.min_diameter, 20);
        assert_eq!(config.brush.max_diameter, 80);
        assert_eq!(config.brush.default_diameter, 20);
        assert_eq!(config.preview.color, [0, 0, 255, 1]);
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MaskerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, MaskerConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[brush\n").unwrap();
        assert!(matches!(
            MaskerConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = MaskerConfig::default();
        config.history.depth = 4;
        let text = config.to_toml().unwrap();
        assert_eq!(MaskerConfig::from_toml(&text).unwrap(), config);
    }
}
