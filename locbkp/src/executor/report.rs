//! The run report written into the staging directory, so it travels
//! inside the archive.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::retention::DATE_FORMAT;
use crate::Result;

/// Report bundled into every archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupReport {
    pub locbkp_version: String,
    pub files_backed: Vec<String>,
    pub dirs_backed: Vec<String>,
    pub size_uncompressed_mb: f64,
}

impl BackupReport {
    pub fn new(files: &[PathBuf], dirs: &[PathBuf], size_uncompressed_mb: f64) -> Self {
        Self {
            locbkp_version: super::VERSION.to_string(),
            files_backed: files.iter().map(|p| p.to_string_lossy().into_owned()).collect(),
            dirs_backed: dirs.iter().map(|p| p.to_string_lossy().into_owned()).collect(),
            size_uncompressed_mb,
        }
    }

    pub fn file_name(created: &NaiveDateTime) -> String {
        format!("LocBkp_report_{}.json", created.format(DATE_FORMAT))
    }

    /// Write the report as pretty-printed JSON into `dir`
    pub fn write_to(&self, dir: &Path, created: &NaiveDateTime) -> Result<PathBuf> {
        let path = dir.join(Self::file_name(created));
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(path)
    }
}
