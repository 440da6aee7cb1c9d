//! Recursive enumeration of backup paths.
//!
//! Every backup path expands into the regular files and the directories
//! reachable from it. Nodes that cannot be read (permission failures,
//! broken symlinks, entries deleted mid-walk, symlink loops) are skipped
//! with one warning per distinct path, and the walk carries on with their
//! siblings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links (loops are detected and skipped)
    pub follow_links: bool,

    /// Maximum depth (None = unlimited)
    pub max_depth: Option<usize>,

    /// File-name substrings to leave out, together with everything below them
    pub exclude_patterns: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: true,
            max_depth: None,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Which kind of node [`TreeEnumerator::enumerate`] collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Files,
    Dirs,
}

/// Files and directories to back up, deduplicated, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationResult {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

/// Walks backup paths for a single run.
///
/// The set of paths already warned about lives here, so a node that fails
/// once for the file pass and again for the directory pass is only reported
/// once per run.
#[derive(Debug, Default)]
pub struct TreeEnumerator {
    options: WalkOptions,
    warned: HashSet<PathBuf>,
    unfollowed_links: HashSet<PathBuf>,
}

impl TreeEnumerator {
    pub fn new(options: WalkOptions) -> Self {
        Self {
            options,
            warned: HashSet::new(),
            unfollowed_links: HashSet::new(),
        }
    }

    /// Collect the regular files (`EntryKind::Files`) or the directories
    /// (`EntryKind::Dirs`) reachable from `root`, `root` itself included when
    /// it is of the requested kind.
    pub fn enumerate(&mut self, root: &Path, kind: EntryKind) -> Vec<PathBuf> {
        let mut result = Vec::new();
        let patterns = self.options.exclude_patterns.clone();

        let mut walker = WalkDir::new(root).follow_links(self.options.follow_links);
        if let Some(max_depth) = self.options.max_depth {
            walker = walker.max_depth(max_depth);
        }

        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !should_exclude(entry, &patterns));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let failed = e.path().unwrap_or(root).to_path_buf();
                    let reason = if e.loop_ancestor().is_some() {
                        "symlink loop".to_string()
                    } else {
                        e.to_string()
                    };
                    self.warn_once(failed, &reason);
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                self.note_unfollowed_link(entry.path());
                continue;
            }
            let wanted = match kind {
                EntryKind::Files => file_type.is_file(),
                EntryKind::Dirs => file_type.is_dir(),
            };
            if wanted {
                result.push(entry.into_path());
            }
        }

        result
    }

    /// Expand every backup path into files and directories, deduplicated
    /// across all paths. The parent of every file is added to the directory
    /// list so staging can create it before copying.
    pub fn prepare_backup_lists(&mut self, roots: &[PathBuf]) -> EnumerationResult {
        let mut result = EnumerationResult::default();
        let mut seen_files = HashSet::new();
        let mut seen_dirs = HashSet::new();

        for root in roots {
            for file in self.enumerate(root, EntryKind::Files) {
                if !seen_files.insert(file.clone()) {
                    continue;
                }
                if let Some(parent) = file.parent() {
                    if seen_dirs.insert(parent.to_path_buf()) {
                        result.dirs.push(parent.to_path_buf());
                    }
                }
                result.files.push(file);
            }

            for dir in self.enumerate(root, EntryKind::Dirs) {
                if seen_dirs.insert(dir.clone()) {
                    result.dirs.push(dir);
                }
            }
        }

        result
    }

    /// Paths skipped so far because they could not be read
    pub fn skipped(&self) -> &HashSet<PathBuf> {
        &self.warned
    }

    /// Symlinks left out because link following is off
    pub fn unfollowed_links(&self) -> &HashSet<PathBuf> {
        &self.unfollowed_links
    }

    fn note_unfollowed_link(&mut self, path: &Path) {
        if self.unfollowed_links.insert(path.to_path_buf()) {
            info!("Skipping symlink {}: link following is disabled", path.display());
        }
    }

    fn warn_once(&mut self, path: PathBuf, reason: &str) {
        if !self.warned.contains(&path) {
            warn!(
                "Could not read {}: {}. It will not be backed up (nor anything inside it)",
                path.display(),
                reason
            );
            self.warned.insert(path);
        }
    }
}

/// Check if a directory entry should be excluded based on patterns
fn should_exclude(entry: &DirEntry, patterns: &[String]) -> bool {
    let file_name = entry.file_name().to_string_lossy();

    patterns.iter().any(|pattern| file_name.contains(pattern.as_str()))
}
