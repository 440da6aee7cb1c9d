//! The per-run staging directory: a mirror of the backup paths' structure
//! under the chosen staging root.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::fs::paths::rebase_onto;
use crate::Result;

/// Outcome of recreating the directory skeleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializedDirs {
    /// Directories created by this call
    pub created: usize,
    /// Source directories whose mirror exists afterwards
    pub backed: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Create the staging directory `name` under `root`.
    pub fn create(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Where `source` lives inside the staging directory
    pub fn staged_path(&self, source: &Path) -> PathBuf {
        rebase_onto(&self.dir, source)
    }

    /// Recreate every directory under the staging directory. Existing
    /// directories are fine; any other failure skips that directory.
    pub fn materialize_dirs(&self, dirs: &[PathBuf]) -> MaterializedDirs {
        let mut outcome = MaterializedDirs::default();

        for dir in dirs {
            let staged = self.staged_path(dir);
            if staged.is_dir() {
                outcome.backed.push(dir.clone());
                continue;
            }

            match fs::create_dir_all(&staged) {
                Ok(()) => {
                    outcome.created += 1;
                    outcome.backed.push(dir.clone());
                }
                Err(_) if staged.is_dir() => outcome.backed.push(dir.clone()),
                Err(e) => warn!("Could not create directory {}: {}", staged.display(), e),
            }
        }

        outcome
    }

    /// Copy every file into its mirrored location and return the sources
    /// that were copied. Files that vanished or stopped being regular files
    /// since enumeration, and files that fail to copy, are skipped.
    ///
    /// `progress` is called after each file with the number of files
    /// attempted so far and the total.
    pub fn copy_files<F>(&self, files: &[PathBuf], mut progress: F) -> Vec<PathBuf>
    where
        F: FnMut(usize, usize),
    {
        let total = files.len();
        let mut copied = Vec::with_capacity(total);

        for (idx, file) in files.iter().enumerate() {
            if self.copy_file(file) {
                copied.push(file.clone());
            }
            progress(idx + 1, total);
        }

        copied
    }

    fn copy_file(&self, file: &Path) -> bool {
        match fs::metadata(file) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                warn!("{} is no longer a regular file, skipping", file.display());
                return false;
            }
            Err(e) => {
                warn!("{} disappeared before it could be copied: {}", file.display(), e);
                return false;
            }
        }

        let destination = self.staged_path(file);
        if let Some(parent) = destination.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Could not create {}: {}", parent.display(), e);
                return false;
            }
        }

        match fs::copy(file, &destination) {
            Ok(bytes) => {
                debug!("Staged {} ({} bytes)", file.display(), bytes);
                true
            }
            Err(e) => {
                warn!("Could not copy {} to {}: {}", file.display(), destination.display(), e);
                false
            }
        }
    }

    /// Delete the staging directory and everything in it
    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_dir_all(&self.dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_materialize_mirrors_structure() -> crate::Result<()> {
        let source = TempDir::new()?;
        let stage = TempDir::new()?;
        let empty = source.path().join("data/empty");
        fs::create_dir_all(&empty)?;

        let area = StagingArea::create(stage.path(), "run")?;
        // Creating the deeper directory first brings its parent along
        let outcome = area.materialize_dirs(&[empty.clone(), source.path().join("data")]);

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.backed.len(), 2);
        assert!(area.staged_path(&empty).is_dir());
        assert!(area.staged_path(&empty).starts_with(area.path()));
        Ok(())
    }

    #[test]
    fn test_materialize_is_idempotent() -> crate::Result<()> {
        let stage = TempDir::new()?;
        let area = StagingArea::create(stage.path(), "run")?;
        let dirs = vec![PathBuf::from("/data/a"), PathBuf::from("/data/b")];

        assert_eq!(area.materialize_dirs(&dirs).created, 2);
        let again = area.materialize_dirs(&dirs);
        assert_eq!(again.created, 0);
        assert_eq!(again.backed, dirs);
        Ok(())
    }

    #[test]
    fn test_materialize_failure_skips_directory() -> crate::Result<()> {
        let stage = TempDir::new()?;
        let area = StagingArea::create(stage.path(), "run")?;

        // A file squatting on the mirrored parent makes the child uncreatable
        let blocker = area.staged_path(Path::new("/data"));
        fs::create_dir_all(blocker.parent().unwrap())?;
        fs::write(&blocker, b"not a dir")?;

        let outcome = area.materialize_dirs(&[PathBuf::from("/data/sub"), PathBuf::from("/other")]);

        assert_eq!(outcome.backed, vec![PathBuf::from("/other")]);
        Ok(())
    }

    #[test]
    fn test_copy_files_skips_vanished_file() -> crate::Result<()> {
        let source = TempDir::new()?;
        let stage = TempDir::new()?;

        let files: Vec<PathBuf> = (0..10)
            .map(|i| source.path().join(format!("file{}.txt", i)))
            .collect();
        for file in &files {
            fs::write(file, b"payload")?;
        }
        fs::remove_file(&files[4])?;

        let area = StagingArea::create(stage.path(), "run")?;
        let mut calls = Vec::new();
        let copied = area.copy_files(&files, |done, total| calls.push((done, total)));

        assert_eq!(copied.len(), 9);
        assert!(!copied.contains(&files[4]));
        assert_eq!(calls.len(), 10);
        assert_eq!(calls.last(), Some(&(10, 10)));
        assert_eq!(fs::read(area.staged_path(&files[0]))?, b"payload");
        Ok(())
    }

    #[test]
    fn test_copy_files_skips_directories() -> crate::Result<()> {
        let source = TempDir::new()?;
        let stage = TempDir::new()?;
        let area = StagingArea::create(stage.path(), "run")?;

        let copied = area.copy_files(&[source.path().to_path_buf()], |_, _| {});

        assert!(copied.is_empty());
        Ok(())
    }

    #[test]
    fn test_remove_deletes_everything() -> crate::Result<()> {
        let stage = TempDir::new()?;
        let area = StagingArea::create(stage.path(), "run")?;
        area.materialize_dirs(&[PathBuf::from("/data/a")]);

        area.remove()?;
        assert!(!area.path().exists());
        Ok(())
    }
}
