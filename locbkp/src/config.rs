//! Tool settings for the backup orchestrator.
//!
//! Settings are optional and loaded from a TOML file. They govern how a run
//! behaves (logging, staging, compression), while the backup list decides
//! what gets backed up.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compress::{Compressor, SevenZip, TarZstd};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogConfig,
    pub staging: StagingConfig,
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Persistent log file, appended to on every run
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Staging root tried when the platform temp directory is too small
    #[serde(default = "default_fallback_root")]
    pub fallback_root: PathBuf,

    /// Maximum enumeration depth below each backup path (None = unlimited)
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Follow symbolic links while enumerating
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "7z")]
    SevenZip,
    #[serde(rename = "tar.zst")]
    TarZstd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Archive format (7z, tar.zst)
    #[serde(default = "default_format")]
    pub format: ArchiveFormat,

    /// Compression level; the format's strongest sensible level when unset
    #[serde(default)]
    pub level: Option<i32>,

    /// Path to the 7-Zip executable
    #[serde(default = "default_sevenzip_path")]
    pub sevenzip_path: PathBuf,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_fallback_root() -> PathBuf {
    PathBuf::from("/var/lib/locbkp/staging")
}

fn default_follow_links() -> bool {
    true
}

fn default_format() -> ArchiveFormat {
    ArchiveFormat::SevenZip
}

fn default_sevenzip_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\Program Files\\7-Zip\\7z.exe")
    } else {
        PathBuf::from("7z")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            fallback_root: default_fallback_root(),
            max_depth: None,
            follow_links: default_follow_links(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            level: None,
            sevenzip_path: default_sevenzip_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Staging roots in priority order: platform temp directory, then the fallback
    pub fn staging_candidates(&self) -> Vec<PathBuf> {
        vec![std::env::temp_dir(), self.staging.fallback_root.clone()]
    }

    /// Build the compressor selected by these settings
    pub fn compressor(&self) -> Box<dyn Compressor> {
        match self.compression.format {
            ArchiveFormat::SevenZip => Box::new(SevenZip::new(
                self.compression.sevenzip_path.clone(),
                self.compression.level.unwrap_or(9),
            )),
            ArchiveFormat::TarZstd => Box::new(TarZstd::new(self.compression.level.unwrap_or(19))),
        }
    }
}
