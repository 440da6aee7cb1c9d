//! Pruning of old archives at the destination.
//!
//! Archives are named `{backup_name}_{timestamp}.{ext}`. Retention parses
//! the timestamp back out of each name, keeps the newest `retention`
//! archives and deletes the rest. Names that do not parse are left alone
//! and do not count.

use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::Result;

/// Timestamp format embedded in archive names
pub const DATE_FORMAT: &str = "%d-%m-%Y_%H.%M.%S";

/// Compose the archive file name for a run.
pub fn archive_file_name(backup_name: &str, created: &NaiveDateTime, extension: &str) -> String {
    format!("{}_{}.{}", backup_name, created.format(DATE_FORMAT), extension)
}

/// Parse the creation timestamp out of an archive file name. Returns `None`
/// when the name does not belong to `backup_name` or its timestamp is
/// malformed.
pub fn parse_archive_file_name(file_name: &str, backup_name: &str, extension: &str) -> Option<NaiveDateTime> {
    let stamp = file_name
        .strip_prefix(backup_name)?
        .strip_prefix('_')?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    NaiveDateTime::parse_from_str(stamp, DATE_FORMAT).ok()
}

/// An archive found at the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub file_name: String,
    pub created: NaiveDateTime,
}

/// What a retention pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionOutcome {
    pub kept: usize,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub unparseable: usize,
}

#[derive(Debug, Clone)]
pub struct RetentionManager {
    dest_dir: PathBuf,
    backup_name: String,
    extension: String,
}

impl RetentionManager {
    pub fn new(dest_dir: impl Into<PathBuf>, backup_name: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            backup_name: backup_name.into(),
            extension: extension.into(),
        }
    }

    /// Archives of this backup at the destination, oldest first. Equal
    /// timestamps keep their directory listing order. Also returns how many
    /// candidates were skipped because their timestamp did not parse.
    pub fn list_archives(&self) -> Result<(Vec<ArchiveRecord>, usize)> {
        let mut records = Vec::new();
        let mut unparseable = 0;

        for entry in fs::read_dir(&self.dest_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Could not read an entry of {}: {}", self.dest_dir.display(), e);
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            if !file_name.starts_with(&self.backup_name) {
                continue;
            }

            match parse_archive_file_name(&file_name, &self.backup_name, &self.extension) {
                Some(created) => records.push(ArchiveRecord { file_name, created }),
                None => {
                    warn!("Skipping {}: no parsable timestamp, retention ignores it", file_name);
                    unparseable += 1;
                }
            }
        }

        records.sort_by_key(|record| record.created);
        Ok((records, unparseable))
    }

    /// Keep the newest `retention` archives and delete the older ones. A
    /// deletion that fails is logged and the pass moves on to the next one.
    pub fn apply(&self, retention: usize) -> Result<RetentionOutcome> {
        let (records, unparseable) = self.list_archives()?;
        info!(
            "Retention: {} archive(s) of {} found, keeping {}, pruning {}",
            records.len(),
            self.backup_name,
            retention,
            records.len().saturating_sub(retention)
        );

        Ok(RetentionOutcome {
            unparseable,
            ..self.prune(&records, retention)
        })
    }

    /// Delete all but the newest `retention` of `records` (oldest first).
    fn prune(&self, records: &[ArchiveRecord], retention: usize) -> RetentionOutcome {
        let mut outcome = RetentionOutcome::default();
        let excess = records.len().saturating_sub(retention);

        for record in records.iter().take(excess) {
            let path = self.dest_dir.join(&record.file_name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!("Pruned old archive {}", path.display());
                    outcome.deleted.push(path);
                }
                Err(e) => {
                    warn!("Could not prune {}: {}", path.display(), e);
                    outcome.failed.push(path);
                }
            }
        }

        outcome.kept = records.len() - outcome.deleted.len();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::TempDir;

    fn stamp(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(23, 15, 7)
            .unwrap()
    }

    fn write_archive(dir: &Path, name: &str, day: u32) -> std::io::Result<String> {
        let file_name = archive_file_name(name, &stamp(day), "7z");
        fs::write(dir.join(&file_name), b"archive")?;
        Ok(file_name)
    }

    fn remaining(dir: &Path) -> std::io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(archive_file_name("nightly", &stamp(5), "7z"), "nightly_05-03-2024_23.15.07.7z");
    }

    #[test]
    fn test_file_name_round_trip() {
        let name = archive_file_name("nightly", &stamp(9), "tar.zst");
        assert_eq!(parse_archive_file_name(&name, "nightly", "tar.zst"), Some(stamp(9)));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert_eq!(parse_archive_file_name("nightly_not-a-date.7z", "nightly", "7z"), None);
        assert_eq!(parse_archive_file_name("nightly2_05-03-2024_23.15.07.7z", "nightly", "7z"), None);
        assert_eq!(parse_archive_file_name("nightly_05-03-2024_23.15.07.zip", "nightly", "7z"), None);
        assert_eq!(parse_archive_file_name("weekly_05-03-2024_23.15.07.7z", "nightly", "7z"), None);
    }

    #[test]
    fn test_oldest_excess_archives_are_deleted() -> crate::Result<()> {
        let dest = TempDir::new()?;
        // Written out of order so listing order does not match age
        let mut names = Vec::new();
        for day in [3, 1, 5, 2, 4] {
            names.push((day, write_archive(dest.path(), "nightly", day)?));
        }

        let outcome = RetentionManager::new(dest.path(), "nightly", "7z").apply(2)?;

        assert_eq!(outcome.deleted.len(), 3);
        assert_eq!(outcome.kept, 2);
        let mut expected: Vec<String> = names
            .iter()
            .filter(|(day, _)| *day >= 4)
            .map(|(_, name)| name.clone())
            .collect();
        expected.sort();
        assert_eq!(remaining(dest.path())?, expected);
        Ok(())
    }

    #[test]
    fn test_unparseable_archive_is_untouched_and_uncounted() -> crate::Result<()> {
        let dest = TempDir::new()?;
        let older = write_archive(dest.path(), "nightly", 1)?;
        let newer = write_archive(dest.path(), "nightly", 2)?;
        fs::write(dest.path().join("nightly_not-a-date.7z"), b"corrupt")?;

        let outcome = RetentionManager::new(dest.path(), "nightly", "7z").apply(1)?;

        assert_eq!(outcome.deleted, vec![dest.path().join(&older)]);
        assert_eq!(outcome.unparseable, 1);
        let left = remaining(dest.path())?;
        assert!(left.contains(&newer));
        assert!(left.contains(&"nightly_not-a-date.7z".to_string()));
        assert_eq!(left.len(), 2);
        Ok(())
    }

    #[test]
    fn test_other_backups_and_directories_are_ignored() -> crate::Result<()> {
        let dest = TempDir::new()?;
        write_archive(dest.path(), "nightly", 1)?;
        write_archive(dest.path(), "weekly", 1)?;
        write_archive(dest.path(), "nightly2", 1)?;
        fs::create_dir(dest.path().join(archive_file_name("nightly", &stamp(2), "7z")))?;

        let outcome = RetentionManager::new(dest.path(), "nightly", "7z").apply(0)?;

        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(remaining(dest.path())?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_under_retention_deletes_nothing() -> crate::Result<()> {
        let dest = TempDir::new()?;
        write_archive(dest.path(), "nightly", 1)?;
        write_archive(dest.path(), "nightly", 2)?;

        let outcome = RetentionManager::new(dest.path(), "nightly", "7z").apply(3)?;

        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.kept, 2);
        Ok(())
    }

    #[test]
    fn test_failed_deletion_does_not_stop_pruning() -> crate::Result<()> {
        let dest = TempDir::new()?;
        write_archive(dest.path(), "nightly", 2)?;
        write_archive(dest.path(), "nightly", 3)?;
        let manager = RetentionManager::new(dest.path(), "nightly", "7z");
        let (mut records, _) = manager.list_archives()?;
        // Oldest candidate vanished before it could be deleted
        records.insert(
            0,
            ArchiveRecord {
                file_name: archive_file_name("nightly", &stamp(1), "7z"),
                created: stamp(1),
            },
        );

        let outcome = manager.prune(&records, 1);

        assert_eq!(outcome.failed, vec![dest.path().join(archive_file_name("nightly", &stamp(1), "7z"))]);
        assert_eq!(outcome.deleted, vec![dest.path().join(archive_file_name("nightly", &stamp(2), "7z"))]);
        assert_eq!(remaining(dest.path())?, vec![archive_file_name("nightly", &stamp(3), "7z")]);
        Ok(())
    }

    #[test]
    fn test_missing_destination_is_error() {
        let manager = RetentionManager::new("/definitely/not/here", "nightly", "7z");
        assert!(manager.apply(1).is_err());
    }
}
