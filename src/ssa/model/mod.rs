pub mod builder;
pub mod format;
pub mod ir;

pub use builder::*;
pub use format::*;
pub use ir::*;
