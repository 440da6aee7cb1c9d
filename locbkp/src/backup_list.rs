//! The backup list: what to back up, where to, and how many archives to keep.
//!
//! Loaded from a JSON file whose keys follow the historical upper-case
//! layout:
//!
//! ```json
//! {
//!   "DESTDIR": "/backups",
//!   "BACKUP": ["/data/a.txt", "/data/sub"],
//!   "BACKUP_NAME": "nightly",
//!   "RETENTION": 3,
//!   "CREATE_SUBDIR": false
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fs::paths::absolutize;
use crate::{LocbkpError, Result};

#[derive(Debug, Deserialize)]
struct RawBackupList {
    #[serde(rename = "DESTDIR")]
    dest_dir: Option<PathBuf>,

    #[serde(rename = "BACKUP")]
    sources: Option<Vec<PathBuf>>,

    #[serde(rename = "BACKUP_NAME")]
    backup_name: Option<String>,

    #[serde(rename = "RETENTION")]
    retention: Option<u32>,

    #[serde(rename = "CREATE_SUBDIR", default)]
    create_subdir: bool,

    #[serde(rename = "EXCLUDE", default)]
    exclude: Vec<String>,
}

/// A validated backup list. Every source existed and the destination
/// directory existed (or was created) when it was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSpec {
    pub dest_dir: PathBuf,
    pub backup_name: String,
    pub sources: Vec<PathBuf>,
    pub retention: usize,
    /// Wrap the archive contents in one top-level folder
    pub create_subdir: bool,
    /// File-name substrings left out of enumeration
    pub exclude: Vec<String>,
}

impl BackupSpec {
    /// Load and validate a backup list file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LocbkpError::Config(format!(
                "Backup list \"{}\" does not exist",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawBackupList = serde_json::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawBackupList) -> Result<Self> {
        let dest_dir = raw.dest_dir.ok_or_else(|| {
            LocbkpError::Config("Destination directory (DESTDIR) is not specified in backup list".to_string())
        })?;
        let dest_dir = absolutize(&dest_dir)?;

        let listed = raw
            .sources
            .ok_or_else(|| LocbkpError::Config("No backup file list (BACKUP) in backup list".to_string()))?;

        let backup_name = raw
            .backup_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| LocbkpError::Config("BACKUP_NAME is not specified in backup list".to_string()))?;
        if backup_name.contains(['/', '\\']) {
            return Err(LocbkpError::Config(format!(
                "BACKUP_NAME \"{}\" must not contain path separators",
                backup_name
            )));
        }

        let retention = raw
            .retention
            .ok_or_else(|| LocbkpError::Config("RETENTION is not specified in backup list".to_string()))?
            as usize;
        if retention == 0 {
            warn!("RETENTION is 0: every {} archive at the destination will be pruned, this run's included", backup_name);
        }

        if !dest_dir.is_dir() {
            std::fs::create_dir_all(&dest_dir).map_err(|e| {
                LocbkpError::Config(format!(
                    "Destination directory {} does not exist and cannot be created: {}",
                    dest_dir.display(),
                    e
                ))
            })?;
            info!("Created destination directory {}", dest_dir.display());
        }

        if listed.is_empty() {
            warn!("Backup file list is empty");
        }

        let mut sources = Vec::with_capacity(listed.len());
        for source in listed {
            let source = absolutize(&source)?;
            if source.exists() {
                sources.push(source);
            } else {
                warn!("Path {} does not exist. Will not back up", source.display());
            }
        }

        if sources.is_empty() {
            return Err(LocbkpError::Config("No existing paths left to back up".to_string()));
        }

        info!(
            "Backup list is valid: {} path(s) to {} as {}",
            sources.len(),
            dest_dir.display(),
            backup_name
        );

        Ok(Self {
            dest_dir,
            backup_name,
            sources,
            retention,
            create_subdir: raw.create_subdir,
            exclude: raw.exclude,
        })
    }
}
