//! Encoding contracts shared by constant emission and the runtime: 64-bit
//! integers as word pairs, float literals, string literals and rune
//! conversions.

pub mod float;
pub mod int64;
pub mod text;
pub mod utf8;

pub use float::float_literal;
pub use int64::{Words, truncate};
pub use text::string_literal;

#[cfg(test)]
#[path = "../../tests/backend/t_marshal.rs"]
mod tests;
