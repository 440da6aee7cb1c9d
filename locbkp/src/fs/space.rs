//! Disk space queries: free space on a filesystem and on-disk size of a
//! backup path.

use std::path::Path;
use sysinfo::Disks;
use tracing::warn;
use walkdir::WalkDir;

use crate::fs::paths::absolutize;

/// Source of free-space figures for a filesystem location.
pub trait SpaceProbe {
    /// Bytes available to an unprivileged user on the filesystem holding `path`.
    fn free_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Probe backed by `statvfs(2)`.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

#[cfg(unix)]
impl SpaceProbe for StatvfsProbe {
    fn free_space(&self, path: &Path) -> std::io::Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(std::io::Error::from)?;
        // Field widths differ between Linux and macOS
        #[allow(clippy::unnecessary_cast)]
        let available = stat.blocks_available() as u64 * stat.fragment_size() as u64;
        Ok(available)
    }
}

/// Probe backed by the mounted-disk list from `sysinfo`. Works on every
/// platform, used where `statvfs` is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisksProbe;

impl SpaceProbe for DisksProbe {
    fn free_space(&self, path: &Path) -> std::io::Result<u64> {
        let path = absolutize(path)?;
        let disks = Disks::new_with_refreshed_list();
        let mounts = disks.iter().map(|d| (d.mount_point(), d.available_space()));

        available_on_mount(&path, mounts).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no mounted disk holds {}", path.display()),
            )
        })
    }
}

/// Free space of the deepest mount point containing `path`.
fn available_on_mount<'a>(path: &Path, mounts: impl IntoIterator<Item = (&'a Path, u64)>) -> Option<u64> {
    mounts
        .into_iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, available)| available)
}

/// The free-space probe for the current platform.
pub fn default_probe() -> Box<dyn SpaceProbe> {
    #[cfg(unix)]
    {
        Box::new(StatvfsProbe)
    }
    #[cfg(not(unix))]
    {
        Box::new(DisksProbe)
    }
}

/// On-disk size of a file, or the recursive size of every file below a
/// directory. Entries that cannot be read count as zero.
pub fn path_size(path: &Path) -> u64 {
    let mut total = 0u64;

    for entry in WalkDir::new(path).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not size {}: {}", e.path().unwrap_or(path).display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() {
            match entry.metadata() {
                Ok(metadata) => total += metadata.len(),
                Err(e) => warn!("Could not stat {}: {}", entry.path().display(), e),
            }
        }
    }

    total
}

/// Size of a directory tree in MiB.
pub fn dir_size_mb(path: &Path) -> f64 {
    bytes_to_mb(path_size(path))
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
