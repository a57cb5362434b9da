//! Float literal spelling.

/// Target literal for `value` stored at `bits` precision. Special values map
/// to the `Math` constants; every finite literal carries a fractional part so
/// the target never reads it as an integer.
pub fn float_literal(value: f64, bits: u8) -> String {
    let value = if bits == 32 {
        value as f32 as f64
    } else {
        value
    };
    if value.is_infinite() {
        return if value > 0.0 {
            "Math.POSITIVE_INFINITY".to_string()
        } else {
            "Math.NEGATIVE_INFINITY".to_string()
        };
    }
    if value.is_nan() {
        return "Math.NaN".to_string();
    }
    // Both zeros spell the same literal.
    if value == 0.0 {
        return "0.0".to_string();
    }
    let text = if bits == 32 {
        format!("{:?}", value as f32)
    } else {
        format!("{:?}", value)
    };
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{}.0", text)
    }
}
