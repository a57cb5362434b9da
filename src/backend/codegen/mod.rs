//! Target source emission for compiled dispatch routines.

pub mod emitter;
pub mod entry;
pub mod haxe;

pub use emitter::{TargetEmitter, emit_dispatch};
pub use entry::{emit_program, position_lookup};
pub use haxe::{HaxeEmitter, class_name};

#[cfg(test)]
#[path = "../../tests/backend/t_codegen.rs"]
mod tests;
