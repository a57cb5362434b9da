pub mod compile;

pub use compile::{CompiledProgram, compile_program};
