//! Rune conversions with the source language's decoder rules.
//!
//! A rune is a signed 32-bit code point. Malformed UTF-8 decodes one byte at
//! a time to U+FFFD; runes that are not valid scalar values encode as U+FFFD.

pub const RUNE_ERROR: i32 = 0xFFFD;

/// Decodes the first rune of `bytes`, returning it and its width in bytes.
/// Empty input gives `(RUNE_ERROR, 0)`; any malformed prefix gives
/// `(RUNE_ERROR, 1)`.
pub fn decode_rune(bytes: &[u8]) -> (i32, usize) {
    let Some(&first) = bytes.first() else {
        return (RUNE_ERROR, 0);
    };
    if first < 0x80 {
        return (i32::from(first), 1);
    }
    // Width and the accepted range of the second byte.
    let (width, lo, hi) = match first {
        0xC2..=0xDF => (2, 0x80, 0xBF),
        0xE0 => (3, 0xA0, 0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, 0x80, 0xBF),
        0xED => (3, 0x80, 0x9F),
        0xF0 => (4, 0x90, 0xBF),
        0xF1..=0xF3 => (4, 0x80, 0xBF),
        0xF4 => (4, 0x80, 0x8F),
        _ => return (RUNE_ERROR, 1),
    };
    if bytes.len() < width {
        return (RUNE_ERROR, 1);
    }
    if !(lo..=hi).contains(&bytes[1]) {
        return (RUNE_ERROR, 1);
    }
    if bytes[2..width].iter().any(|b| !(0x80..=0xBF).contains(b)) {
        return (RUNE_ERROR, 1);
    }

    let lead_bits = match width {
        2 => first & 0x1F,
        3 => first & 0x0F,
        _ => first & 0x07,
    };
    let rune = bytes[1..width]
        .iter()
        .fold(i32::from(lead_bits), |acc, b| (acc << 6) | i32::from(b & 0x3F));
    (rune, width)
}

pub fn utf8_to_runes(bytes: &[u8]) -> Vec<i32> {
    let mut runes = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        let (rune, width) = decode_rune(rest);
        runes.push(rune);
        rest = &rest[width..];
    }
    runes
}

fn scalar(rune: i32) -> char {
    u32::try_from(rune)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

pub fn runes_to_utf8(runes: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(runes.len());
    let mut buf = [0u8; 4];
    for &rune in runes {
        out.extend_from_slice(scalar(rune).encode_utf8(&mut buf).as_bytes());
    }
    out
}

/// Unpaired surrogates decode to U+FFFD.
pub fn utf16_to_runes(units: &[u16]) -> Vec<i32> {
    char::decode_utf16(units.iter().copied())
        .map(|unit| unit.map_or(RUNE_ERROR, |ch| ch as i32))
        .collect()
}

pub fn runes_to_utf16(runes: &[i32]) -> Vec<u16> {
    let mut out = Vec::with_capacity(runes.len());
    let mut buf = [0u16; 2];
    for &rune in runes {
        out.extend_from_slice(scalar(rune).encode_utf16(&mut buf));
    }
    out
}
