pub mod analysis;
pub mod model;
pub mod verify;

pub use model::*;
