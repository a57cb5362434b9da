//! SSA to resumable dispatch-routine compiler backend.
//!
//! Every function of a verified SSA program becomes a dispatch routine: a set
//! of numbered pseudo-blocks that can stop at any scheduling point and pick up
//! again from the stored block index. The `runtime` module executes these
//! routines with a cooperative round-robin scheduler.

pub mod backend;
pub mod context;
pub mod diag;
pub mod driver;
pub mod runtime;
pub mod ssa;
