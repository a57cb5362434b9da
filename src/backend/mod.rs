//! Backend: turns verified SSA into resumable dispatch routines and target
//! source text.

pub mod codegen;
pub mod marshal;
pub mod regalloc;
pub mod resume;
pub mod split;
pub mod structure;
