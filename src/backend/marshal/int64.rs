//! 64-bit integers on backends without a native 64-bit type.
//!
//! A value is carried as a high word with the sign and a low word that is
//! always read as unsigned. The same pair encodes both `i64` and `u64`; only
//! the reading differs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Words {
    pub hi: i32,
    pub lo: u32,
}

impl Words {
    pub fn from_i64(value: i64) -> Self {
        Words {
            hi: (value >> 32) as i32,
            lo: value as u32,
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Words {
            hi: (value >> 32) as u32 as i32,
            lo: value as u32,
        }
    }

    pub fn to_i64(self) -> i64 {
        ((self.hi as i64) << 32) | self.lo as i64
    }

    pub fn to_u64(self) -> u64 {
        ((self.hi as u32 as u64) << 32) | self.lo as u64
    }

    /// The high word only repeats the sign of the low word's 32-bit reading.
    pub fn fits_32(self) -> bool {
        self.hi == 0 || self.hi == -1
    }
}

impl fmt::Display for Words {
    /// Target constructor call, both words in hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GOint64.make(0x{:x},0x{:x})", self.hi as u32, self.lo)
    }
}

/// Wraps `value` to an integer type of `bits` width (at most 64).
pub fn truncate(value: i128, signed: bool, bits: u8) -> i128 {
    let bits = u32::from(bits.clamp(1, 64));
    let mask: u128 = (1u128 << bits) - 1;
    let low = (value as u128) & mask;
    if signed && (low >> (bits - 1)) & 1 == 1 {
        low as i128 - (1i128 << bits)
    } else {
        low as i128
    }
}

/// Whether `value` is representable in 64 bits, signed or unsigned.
pub fn in_64bit_range(value: i128) -> bool {
    value >= i128::from(i64::MIN) && value <= i128::from(u64::MAX)
}
