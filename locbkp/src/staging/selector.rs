//! Choice of the staging root for a run.
//!
//! The staging root must hold the uncompressed mirror and the compressed
//! archive at the same time, plus a fixed safety margin. The destination is
//! checked first: if it cannot hold the sources, no staging root helps.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fs::space::{path_size, SpaceProbe};
use crate::{LocbkpError, Result};

/// Headroom required on the staging root on top of twice the source size.
pub const SAFETY_MARGIN: u64 = 1024 * 1024 * 1024;

/// Free space a staging root needs for `total_size` bytes of sources.
pub fn required_space(total_size: u64) -> u64 {
    total_size.saturating_mul(2).saturating_add(SAFETY_MARGIN)
}

/// Staging root chosen for a run, with the source size it was sized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPlan {
    pub root: PathBuf,
    pub total_size: u64,
}

pub struct StagingSelector<'a> {
    probe: &'a dyn SpaceProbe,
}

impl<'a> StagingSelector<'a> {
    pub fn new(probe: &'a dyn SpaceProbe) -> Self {
        Self { probe }
    }

    /// Size the sources and pick the first candidate root with enough room.
    /// Nothing is cached; every call measures again.
    pub fn select(&self, sources: &[PathBuf], dest: &Path, candidates: &[PathBuf]) -> Result<StagingPlan> {
        let total_size: u64 = sources.iter().map(|source| path_size(source)).sum();
        info!("Backup sources take {} bytes on disk", total_size);
        self.select_for_size(total_size, dest, candidates)
    }

    pub fn select_for_size(&self, total_size: u64, dest: &Path, candidates: &[PathBuf]) -> Result<StagingPlan> {
        let dest_free = self.probe.free_space(dest)?;
        if total_size >= dest_free {
            return Err(LocbkpError::InsufficientSpace {
                path: dest.to_path_buf(),
                required: total_size,
                available: dest_free,
            });
        }

        let required = required_space(total_size);

        for candidate in candidates {
            if let Err(e) = std::fs::create_dir_all(candidate) {
                warn!("Could not create staging root {}: {}", candidate.display(), e);
                continue;
            }

            let free = match self.probe.free_space(candidate) {
                Ok(free) => free,
                Err(e) => {
                    warn!("Could not query free space at {}: {}", candidate.display(), e);
                    continue;
                }
            };

            if free > required {
                info!(
                    "Staging in {} ({} bytes free, {} required)",
                    candidate.display(),
                    free,
                    required
                );
                return Ok(StagingPlan {
                    root: candidate.clone(),
                    total_size,
                });
            }

            info!(
                "Staging root {} too small: {} bytes free, {} required",
                candidate.display(),
                free,
                required
            );
        }

        Err(LocbkpError::NoStagingRoot { required })
    }
}
