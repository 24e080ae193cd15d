//! Numeric literal parsing for the text format: signs, hex, single `_`
//! separators, hex floats, and NaN payloads.

/// Strips `_` separators, rejecting doubled, leading, or trailing ones.
fn strip_separators(digits: &str) -> Option<String> {
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }

    Some(digits.replace('_', ""))
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

fn parse_magnitude(text: &str) -> Option<u128> {
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (text, 10),
    };

    u128::from_str_radix(&strip_separators(digits)?, radix).ok()
}

/// An i32 literal: `-2^31 ..= 2^32-1`, unsigned values wrapping.
pub fn parse_i32(text: &str) -> Option<i32> {
    let (negative, rest) = split_sign(text);
    let magnitude = parse_magnitude(rest)?;

    if negative {
        if magnitude > 1 << 31 {
            return None;
        }

        Some((magnitude as u32).wrapping_neg() as i32)
    } else {
        if magnitude > u32::MAX as u128 {
            return None;
        }

        Some(magnitude as u32 as i32)
    }
}

/// An i64 literal: `-2^63 ..= 2^64-1`, unsigned values wrapping.
pub fn parse_i64(text: &str) -> Option<i64> {
    let (negative, rest) = split_sign(text);
    let magnitude = parse_magnitude(rest)?;

    if negative {
        if magnitude > 1 << 63 {
            return None;
        }

        Some((magnitude as u64).wrapping_neg() as i64)
    } else {
        if magnitude > u64::MAX as u128 {
            return None;
        }

        Some(magnitude as u64 as i64)
    }
}

/// An unsigned index or alignment value.
pub fn parse_u32(text: &str) -> Option<u32> {
    let (negative, rest) = split_sign(text);

    if negative {
        return None;
    }

    let magnitude = parse_magnitude(rest)?;

    u32::try_from(magnitude).ok()
}

pub fn parse_u64(text: &str) -> Option<u64> {
    let (negative, rest) = split_sign(text);

    if negative {
        return None;
    }

    let magnitude = parse_magnitude(rest)?;

    u64::try_from(magnitude).ok()
}

const F32_QUIET: u32 = 0x0040_0000;
const F64_QUIET: u64 = 0x0008_0000_0000_0000;

pub fn parse_f32(text: &str) -> Option<f32> {
    let (negative, rest) = split_sign(text);

    let value = if rest == "inf" {
        f32::INFINITY
    } else if rest == "nan" {
        f32::from_bits(0x7F80_0000 | F32_QUIET)
    } else if let Some(payload) = rest.strip_prefix("nan:0x") {
        let payload = u32::from_str_radix(&strip_separators(payload)?, 16).ok()?;

        if payload == 0 || payload > 0x007F_FFFF {
            return None;
        }

        f32::from_bits(0x7F80_0000 | payload)
    } else {
        parse_finite(rest)? as f32
    };

    Some(if negative { -value } else { value })
}

pub fn parse_f64(text: &str) -> Option<f64> {
    let (negative, rest) = split_sign(text);

    let value = if rest == "inf" {
        f64::INFINITY
    } else if rest == "nan" {
        f64::from_bits(0x7FF0_0000_0000_0000 | F64_QUIET)
    } else if let Some(payload) = rest.strip_prefix("nan:0x") {
        let payload = u64::from_str_radix(&strip_separators(payload)?, 16).ok()?;

        if payload == 0 || payload > 0x000F_FFFF_FFFF_FFFF {
            return None;
        }

        f64::from_bits(0x7FF0_0000_0000_0000 | payload)
    } else {
        parse_finite(rest)?
    };

    Some(if negative { -value } else { value })
}

/// A finite decimal or hexadecimal float without sign.
fn parse_finite(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return parse_hex_float(hex);
    }

    let mut cleaned = strip_number(text)?;

    // The grammar allows a bare trailing point; the standard parser does not.
    if cleaned.ends_with('.') {
        cleaned.push('0');
    } else if let Some(split) = cleaned.find(".e").or_else(|| cleaned.find(".E")) {
        cleaned.insert(split + 1, '0');
    }

    cleaned.parse::<f64>().ok()
}

/// Removes separators from a decimal float, preserving `.`, `e`, and signs.
fn strip_number(text: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(text.len());
    let mut previous_underscore = true; // leading underscore is an error

    for ch in text.chars() {
        if ch == '_' {
            if previous_underscore {
                return None;
            }

            previous_underscore = true;
            continue;
        }

        previous_underscore = false;
        cleaned.push(ch);
    }

    if text.ends_with('_') {
        return None;
    }

    Some(cleaned)
}

/// `H.HHHHpE` with hex mantissa digits and a binary exponent.
fn parse_hex_float(text: &str) -> Option<f64> {
    let cleaned = strip_number(text)?;

    let (mantissa_text, exponent) = match cleaned.find(['p', 'P']) {
        Some(split) => {
            let exponent: i32 = cleaned[split + 1..].parse().ok()?;

            (&cleaned[..split], exponent)
        }
        None => (cleaned.as_str(), 0),
    };

    let (integer_text, fraction_text) = match mantissa_text.find('.') {
        Some(split) => (&mantissa_text[..split], &mantissa_text[split + 1..]),
        None => (mantissa_text, ""),
    };

    if integer_text.is_empty() && fraction_text.is_empty() {
        return None;
    }

    let mut mantissa = 0f64;

    for digit in integer_text.chars() {
        mantissa = mantissa * 16.0 + digit.to_digit(16)? as f64;
    }

    let mut scale = 1.0 / 16.0;

    for digit in fraction_text.chars() {
        mantissa += digit.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }

    Some(mantissa * (exponent as f64).exp2())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_with_radix_and_sign() {
        assert_eq!(parse_i32("42"), Some(42));
        assert_eq!(parse_i32("-42"), Some(-42));
        assert_eq!(parse_i32("0xFF"), Some(255));
        assert_eq!(parse_i32("-0x80000000"), Some(i32::MIN));
        assert_eq!(parse_i32("4294967295"), Some(-1));
        assert_eq!(parse_i32("4294967296"), None);
        assert_eq!(parse_i64("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_i64("18446744073709551615"), Some(-1));
    }

    #[test]
    fn separators_are_single_only() {
        assert_eq!(parse_i32("1_000_000"), Some(1_000_000));
        assert_eq!(parse_i32("1__0"), None);
        assert_eq!(parse_i32("_1"), None);
        assert_eq!(parse_i32("1_"), None);
    }

    #[test]
    fn unsigned_rejects_signs() {
        assert_eq!(parse_u32("8"), Some(8));
        assert_eq!(parse_u32("-8"), None);
    }

    #[test]
    fn decimal_floats() {
        assert_eq!(parse_f64("1.5"), Some(1.5));
        assert_eq!(parse_f64("-1.5"), Some(-1.5));
        assert_eq!(parse_f64("1e3"), Some(1000.0));
        assert_eq!(parse_f64("1_000.5"), Some(1000.5));
        assert_eq!(parse_f32("0.25"), Some(0.25));
    }

    #[test]
    fn hex_floats() {
        assert_eq!(parse_f64("0x1.8p3"), Some(12.0));
        assert_eq!(parse_f64("0x1p-2"), Some(0.25));
        assert_eq!(parse_f64("0xA"), Some(10.0));
        assert_eq!(parse_f32("-0x1.8p+1"), Some(-3.0));
    }

    #[test]
    fn infinities_and_nans() {
        assert_eq!(parse_f64("inf"), Some(f64::INFINITY));
        assert_eq!(parse_f64("-inf"), Some(f64::NEG_INFINITY));

        let canonical = parse_f64("nan").unwrap();
        assert_eq!(canonical.to_bits(), 0x7FF8_0000_0000_0000);

        let payload = parse_f64("nan:0x123").unwrap();
        assert_eq!(payload.to_bits(), 0x7FF0_0000_0000_0123);

        let negative = parse_f32("-nan").unwrap();
        assert_eq!(negative.to_bits(), 0xFFC0_0000);

        assert_eq!(parse_f32("nan:0x0"), None);
        assert_eq!(parse_f32("nan:0x800000"), None);
    }
}
