//! Re-basing of absolute source paths onto a staging root.
//!
//! `Path::join` replaces the base when the joined path is absolute, so a
//! source like `/home/u/file.txt` has to lose its root marker before it can
//! be nested under the staging root.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Nest `path` under `base`, dropping its root and keeping the rest of its
/// structure. A Windows drive prefix keeps its letter but loses the colon
/// (`C:\data` becomes `<base>\C\data`). `..` never climbs above `base`.
pub fn rebase_onto(base: &Path, path: &Path) -> PathBuf {
    let mut result = base.to_path_buf();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                let marker: OsString = prefix
                    .as_os_str()
                    .to_string_lossy()
                    .replace(':', "")
                    .trim_start_matches(['\\', '?', '.'])
                    .into();
                if !marker.is_empty() {
                    result.push(marker);
                    depth += 1;
                }
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    result.pop();
                    depth -= 1;
                }
            }
            Component::Normal(segment) => {
                result.push(segment);
                depth += 1;
            }
        }
    }

    result
}

/// Inverse of [`rebase_onto`] for Unix-style roots: recover the original
/// absolute path from a staged one. Returns `None` when `staged` is not
/// under `base`.
pub fn strip_base(base: &Path, staged: &Path) -> Option<PathBuf> {
    let relative = staged.strip_prefix(base).ok()?;
    let mut original = PathBuf::from(std::path::MAIN_SEPARATOR_STR);
    original.push(relative);
    Some(original)
}

/// Make `path` absolute against the current working directory without
/// resolving symlinks.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
