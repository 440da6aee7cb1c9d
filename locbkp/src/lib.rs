//! LocBkp library
//!
//! Local backup orchestrator: mirrors a list of files and directories into a
//! staging area, packs it into one archive, copies the archive to a
//! destination directory and prunes old archives there.

pub mod backup_list;
pub mod compress;
pub mod config;
pub mod executor;
pub mod fs;
pub mod retention;
pub mod staging;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use backup_list::BackupSpec;
pub use config::Settings;
pub use executor::{BackupRun, RunOutcome, RunState, VERSION};
pub use utils::errors::LocbkpError;
pub type Result<T> = std::result::Result<T, LocbkpError>;
