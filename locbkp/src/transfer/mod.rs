//! Delivery of the finished archive to the destination directory.

pub mod progress;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{LocbkpError, Result};

/// Copies archives to a mounted or local destination directory.
#[derive(Debug, Clone)]
pub struct Transferor {
    dest_dir: PathBuf,
}

impl Transferor {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
        }
    }

    /// Copy `archive` into the destination as `file_name`.
    ///
    /// The bytes land in a hidden `.part` file first and are renamed into
    /// place, so the destination never shows a half-written archive under its
    /// final name.
    pub fn transfer(&self, archive: &Path, file_name: &str) -> Result<PathBuf> {
        self.deliver(file_name, |partial| fs::copy(archive, partial))
    }

    /// Write `file_name` through `write` into its `.part` file, then rename
    /// it into place. The `.part` file is removed whenever either step fails.
    fn deliver<F>(&self, file_name: &str, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> io::Result<u64>,
    {
        let target = self.dest_dir.join(file_name);
        let partial = self.dest_dir.join(format!(".{}.part", file_name));

        let bytes = match write(&partial) {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_partial(&partial);
                return Err(LocbkpError::Transfer(format!(
                    "could not write {}: {}",
                    partial.display(),
                    e
                )));
            }
        };

        if let Err(e) = fs::rename(&partial, &target) {
            discard_partial(&partial);
            return Err(LocbkpError::Transfer(format!(
                "could not move {} into place: {}",
                target.display(),
                e
            )));
        }

        info!("Transferred {} ({}) to {}", file_name, progress::format_bytes(bytes), target.display());
        Ok(target)
    }
}

fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial transfer {}: {}", partial.display(), e),
    }
}
