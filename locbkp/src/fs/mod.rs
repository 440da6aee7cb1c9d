//! File system operations for backup runs.

pub mod paths;
pub mod space;
pub mod walker;

pub use paths::{absolutize, rebase_onto, strip_base};
#[cfg(unix)]
pub use space::StatvfsProbe;
pub use space::{default_probe, DisksProbe, SpaceProbe};
pub use walker::{EntryKind, EnumerationResult, TreeEnumerator, WalkOptions};
