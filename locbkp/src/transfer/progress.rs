//! Progress reporting for the staging copy, plus size and duration
//! formatting for log lines.
//!
//! Progress is logged at percentage milestones. The step between milestones
//! shrinks as the number of files grows, so small runs are not flooded with
//! lines and large runs still show movement.

use std::time::Duration;
use tracing::info;

/// (file count threshold, milestone step in percent), largest threshold first
const MILESTONE_STEPS: &[(usize, usize)] = &[(1000, 1), (500, 5), (300, 10), (20, 20), (2, 50)];

/// Milestone step in percent for a run of `total` files
pub fn milestone_step(total: usize) -> usize {
    MILESTONE_STEPS
        .iter()
        .find(|(threshold, _)| total > *threshold)
        .map(|(_, step)| *step)
        .unwrap_or(100)
}

/// Logs copy progress when a new milestone is crossed.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    total: usize,
    step: usize,
    next_milestone: usize,
}

impl ProgressLogger {
    pub fn new(total: usize) -> Self {
        let step = milestone_step(total);
        Self {
            total,
            step,
            next_milestone: step,
        }
    }

    /// Record that `done` of the files have been handled. Returns the
    /// milestone logged, if any.
    pub fn update(&mut self, done: usize) -> Option<usize> {
        if self.total == 0 {
            return None;
        }

        let percent = done.min(self.total) * 100 / self.total;
        if percent < self.next_milestone {
            return None;
        }

        let milestone = percent / self.step * self.step;
        self.next_milestone = milestone + self.step;
        info!("{}% ({} of {} files)", milestone, done, self.total);
        Some(milestone)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format a stage duration as seconds with millisecond precision
pub fn format_seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
