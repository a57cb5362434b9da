//! String literal spelling.
//!
//! Bytes that are printable ASCII (other than the quote, backtick, backslash
//! and slash characters) are copied as they are. Anything else is escaped in
//! one of two ways: byte escapes inside the literal for backends with 8-bit
//! strings, or explicit character constructions for backends with UTF-16
//! strings.

use std::fmt::Write;

use crate::context::StringEncoding;

fn is_plain(byte: u8) -> bool {
    (0x20..0x7f).contains(&byte) && !matches!(byte, b'"' | b'`' | b'\\' | b'/')
}

pub fn string_literal(bytes: &[u8], encoding: StringEncoding) -> String {
    if bytes.iter().copied().all(is_plain) {
        return quoted(bytes);
    }
    match encoding {
        StringEncoding::Narrow => narrow(bytes),
        StringEncoding::Universal => universal(bytes),
        StringEncoding::Both => format!(
            " #if (cpp || neko || php) {} #else {} #end ",
            narrow(bytes),
            universal(bytes)
        ),
    }
}

fn quoted(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    out.extend(bytes.iter().map(|b| char::from(*b)));
    out.push('"');
    out
}

fn narrow(bytes: &[u8]) -> String {
    let mut out = String::from("\"");
    for &byte in bytes {
        if is_plain(byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "\\x{:02X}", byte);
        }
    }
    out.push('"');
    out
}

fn universal(bytes: &[u8]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run: Vec<u8> = Vec::new();
    for &byte in bytes {
        if is_plain(byte) {
            run.push(byte);
            continue;
        }
        if !run.is_empty() {
            parts.push(quoted(&run));
            run.clear();
        }
        parts.push(format!("String.fromCharCode({})", byte));
    }
    if !run.is_empty() {
        parts.push(quoted(&run));
    }
    parts.join("+")
}
