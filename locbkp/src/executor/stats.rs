//! Counters and stage timings for one run.

use std::time::{Duration, Instant};
use tracing::info;

use crate::transfer::progress::format_seconds;

/// Statistics accumulated by a single [`BackupRun`](super::BackupRun).
///
/// Each stage duration runs from the end of the previous stage to the end
/// of its own; preparation starts at run start.
#[derive(Debug, Clone)]
pub struct BackupRunStats {
    pub files_backed: usize,
    pub dirs_backed: usize,
    pub dirs_created: usize,
    pub skipped_paths: usize,
    pub size_before_mb: f64,
    /// `None` until an archive has been produced
    pub size_after_mb: Option<f64>,
    pub preparation: Duration,
    pub staging: Duration,
    pub compression: Duration,
    pub transfer: Duration,
    pub cleanup: Duration,
    started: Instant,
    last_mark: Instant,
}

impl BackupRunStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            files_backed: 0,
            dirs_backed: 0,
            dirs_created: 0,
            skipped_paths: 0,
            size_before_mb: 0.0,
            size_after_mb: None,
            preparation: Duration::ZERO,
            staging: Duration::ZERO,
            compression: Duration::ZERO,
            transfer: Duration::ZERO,
            cleanup: Duration::ZERO,
            started: now,
            last_mark: now,
        }
    }

    /// Time since the previous mark, and set a new mark
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_mark);
        self.last_mark = now;
        elapsed
    }

    pub fn total_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Space saved by compression, in percent of the uncompressed size.
    /// `None` when no archive was produced.
    pub fn compression_effectiveness(&self) -> Option<f64> {
        let after = self.size_after_mb?;
        if self.size_before_mb > 0.0 {
            Some(100.0 - (after / self.size_before_mb) * 100.0)
        } else {
            Some(0.0)
        }
    }

    pub fn log_summary(&self) {
        info!("Backed up {} files and {} directories.", self.files_backed, self.dirs_backed);
        info!(
            "Time: Preparation: {}; Copy: {}; Compress: {}; Transfer: {}; Cleanup: {}.",
            format_seconds(self.preparation),
            format_seconds(self.staging),
            format_seconds(self.compression),
            format_seconds(self.transfer),
            format_seconds(self.cleanup)
        );
        match (self.size_after_mb, self.compression_effectiveness()) {
            (Some(after), Some(effectiveness)) => info!(
                "Size: {:.3}MB uncompressed, {:.3}MB compressed. Compression effectiveness is {:.2}%",
                self.size_before_mb, after, effectiveness
            ),
            _ => info!("Size: {:.3}MB uncompressed, no archive produced.", self.size_before_mb),
        }
        info!("Total time is {}.", format_seconds(self.total_elapsed()));
    }
}

impl Default for BackupRunStats {
    fn default() -> Self {
        Self::new()
    }
}
