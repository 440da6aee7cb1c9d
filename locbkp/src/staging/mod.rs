//! Staging: choosing where the mirror lives and filling it.

pub mod area;
pub mod selector;

pub use area::{MaterializedDirs, StagingArea};
pub use selector::{required_space, StagingPlan, StagingSelector, SAFETY_MARGIN};
