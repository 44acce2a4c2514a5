//! Numeric and boolean scanning, and double formatting.
//!
//! Integer literals pick their base from the leading characters: `0x`/`0X`
//! is hex, a leading `0` is octal, anything else decimal. Double scanning
//! is always decimal, so `"010"` reads as 8 when an integer is requested and
//! as 10.0 when a double is.

use crate::error::{ArithCode, TclError, TclResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    /// No number at the start of the input.
    Invalid,
    IntOverflow,
    FloatOverflow,
    FloatUnderflow,
}

fn skip_blanks(src: &[u8], mut i: usize) -> usize {
    while i < src.len() && src[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn only_blanks_from(src: &[u8], i: usize) -> bool {
    skip_blanks(src, i) == src.len()
}

// ── Integers ──────────────────────────────────────────────────────────────────

/// Scan an integer at the start of `src`: optional leading blanks and sign,
/// then digits in an auto-detected base. Returns the value and the number
/// of bytes consumed.
///
/// Decimal magnitudes must fit `i64`. Hex and octal magnitudes may use all
/// 64 bits and are reinterpreted as two's complement.
pub fn scan_int(src: &[u8]) -> Result<(i64, usize), ScanError> {
    let mut i = skip_blanks(src, 0);
    let negative = match src.get(i) {
        None => return Err(ScanError::Invalid),
        Some(b'-') => true,
        _ => false,
    };
    if matches!(src.get(i), Some(b'-' | b'+')) {
        i += 1;
    }
    if i >= src.len() {
        return Err(ScanError::Invalid);
    }

    let mut any_digits = false;
    let base: u32 = if src[i] == b'0' {
        // "0x" counts as a hex prefix only with at least one more byte.
        if i + 2 < src.len() && matches!(src[i + 1], b'x' | b'X') {
            i += 2;
            16
        } else {
            any_digits = true;
            8
        }
    } else {
        10
    };

    let mut magnitude: u64 = 0;
    let mut overflow = false;
    while let Some(d) = src.get(i).and_then(|b| (*b as char).to_digit(base)) {
        match magnitude
            .checked_mul(u64::from(base))
            .and_then(|m| m.checked_add(u64::from(d)))
        {
            Some(m) => magnitude = m,
            None => overflow = true,
        }
        any_digits = true;
        i += 1;
    }
    if !any_digits {
        return Err(ScanError::Invalid);
    }
    if base == 10 {
        let limit = if negative {
            i64::MAX as u64 + 1
        } else {
            i64::MAX as u64
        };
        if magnitude > limit {
            overflow = true;
        }
    }
    if overflow {
        return Err(ScanError::IntOverflow);
    }
    let value = magnitude as i64;
    Ok((if negative { value.wrapping_neg() } else { value }, i))
}

/// Decide whether text at the start of `src` should be scanned as an integer
/// rather than a double. With `whole`, the entire input (ignoring blanks)
/// must look like an integer.
pub fn looks_like_int(src: &[u8], whole: bool) -> bool {
    let mut i = skip_blanks(src, 0);
    if matches!(src.get(i), Some(b'+' | b'-')) {
        i += 1;
    }
    if !src.get(i).is_some_and(u8::is_ascii_digit) {
        return false;
    }
    if src[i] == b'0'
        && matches!(src.get(i + 1), Some(b'x' | b'X'))
        && src.get(i + 2).is_some_and(u8::is_ascii_hexdigit)
    {
        i += 2;
        while src.get(i).is_some_and(u8::is_ascii_hexdigit) {
            i += 1;
        }
        return !whole || only_blanks_from(src, i);
    }
    while src.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    let Some(&c) = src.get(i) else {
        return true;
    };
    if !whole && c != b'.' && c != b'e' && c != b'E' {
        return true;
    }
    if c == b'e' || c == b'E' {
        if whole {
            return false;
        }
        // "1eq2" reads as the integer 1 followed by more text.
        return match src.get(i + 1) {
            None => true,
            Some(n) => !(n.is_ascii_digit() || *n == b'+' || *n == b'-'),
        };
    }
    whole && only_blanks_from(src, i)
}

/// Parse a whole string as an integer. Surrounding blanks are allowed.
pub fn get_int(s: &str) -> TclResult<i64> {
    let src = s.as_bytes();
    match scan_int(src) {
        Ok((n, len)) if only_blanks_from(src, len) => Ok(n),
        Err(ScanError::IntOverflow) => Err(TclError::Arith(ArithCode::IntOverflow)),
        _ => Err(TclError::runtime(format!(
            "expected integer but got \"{s}\"{}",
            bad_octal_hint(s)
        ))),
    }
}

fn bad_octal_hint(s: &str) -> &'static str {
    let t = s.trim_start().trim_start_matches(['+', '-']);
    if t.len() > 1 && t.starts_with('0') && t.bytes().all(|b| b.is_ascii_digit()) {
        " (looks like invalid octal number)"
    } else {
        ""
    }
}

// ── Doubles ───────────────────────────────────────────────────────────────────

/// Scan a decimal floating-point number at the start of `src`, including
/// `NaN`, `Inf` and `Infinity` in any case. An exponent marker not
/// followed by digits (`1e`, `1eq`) ends the number before the marker.
pub fn scan_double(src: &[u8]) -> Result<(f64, usize), ScanError> {
    let mut i = skip_blanks(src, 0);
    if i >= src.len() {
        return Err(ScanError::Invalid);
    }
    if src.len() - i >= 3 && src[i..i + 3].eq_ignore_ascii_case(b"nan") {
        return Ok((f64::NAN, i + 3));
    }
    let negative = src[i] == b'-';
    if matches!(src[i], b'-' | b'+') {
        i += 1;
        if i >= src.len() {
            return Err(ScanError::Invalid);
        }
    }
    let rest = &src[i..];
    for word in [&b"infinity"[..], &b"inf"[..]] {
        let len = word.len();
        if rest.len() >= len && rest[..len].eq_ignore_ascii_case(word) {
            let inf = if negative { f64::NEG_INFINITY } else { f64::INFINITY };
            return Ok((inf, i + len));
        }
    }

    let mantissa_start = i;
    let mut seen_point = false;
    let mut maybe_zero = true;
    while let Some(&c) = src.get(i) {
        if c == b'.' && !seen_point {
            seen_point = true;
        } else if !c.is_ascii_digit() {
            break;
        } else if c != b'0' {
            maybe_zero = false;
        }
        i += 1;
    }
    if i == mantissa_start || (i == mantissa_start + 1 && seen_point) {
        return Err(ScanError::Invalid);
    }
    if matches!(src.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(src.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if src.get(j).is_some_and(u8::is_ascii_digit) {
            while src.get(j).is_some_and(u8::is_ascii_digit) {
                j += 1;
            }
            i = j;
        }
    }

    let text = std::str::from_utf8(&src[mantissa_start..i]).map_err(|_| ScanError::Invalid)?;
    let value: f64 = text.parse().map_err(|_| ScanError::Invalid)?;
    if value.is_infinite() {
        return Err(ScanError::FloatOverflow);
    }
    if value == 0.0 && !maybe_zero {
        return Err(ScanError::FloatUnderflow);
    }
    Ok((if negative { -value } else { value }, i))
}

/// Parse a whole string as a double. Surrounding blanks are allowed.
pub fn get_double(s: &str) -> TclResult<f64> {
    let src = s.as_bytes();
    match scan_double(src) {
        Ok((d, len)) if only_blanks_from(src, len) => Ok(d),
        Err(ScanError::FloatOverflow) => Err(TclError::Arith(ArithCode::FloatOverflow)),
        Err(ScanError::FloatUnderflow) => Err(TclError::Arith(ArithCode::FloatUnderflow)),
        _ => Err(TclError::runtime(format!(
            "expected floating-point number but got \"{s}\""
        ))),
    }
}

// ── Booleans ──────────────────────────────────────────────────────────────────

/// Longest boolean word that is a prefix of `s` (case-sensitive), as
/// recognised inside expressions: `false`, `no`, `off`, `on`, `true`, `yes`
/// and their prefixes (`o` alone is ambiguous and never matches).
pub fn boolean_token(s: &str) -> Option<&'static str> {
    const WORDS: [&[&str]; 6] = [
        &["false", "fals", "fal", "fa", "f"],
        &["no", "n"],
        &["off", "of"],
        &["on"],
        &["true", "tru", "tr", "t"],
        &["yes", "ye", "y"],
    ];
    WORDS
        .iter()
        .flat_map(|group| group.iter())
        .find(|w| s.starts_with(**w))
        .copied()
}

/// Interpret `s` as a boolean: `0`/`1`, any number (non-zero is true), or a
/// case-insensitive unique prefix of `true`, `false`, `yes`, `no`, `on`,
/// `off`.
pub fn get_boolean(s: &str) -> TclResult<bool> {
    let lower = s.to_ascii_lowercase();
    let t = lower.trim();
    if !t.is_empty() {
        let prefix_of = |word: &str| word.starts_with(t);
        match t.as_bytes()[0] {
            b'f' if prefix_of("false") => return Ok(false),
            b'n' if prefix_of("no") => return Ok(false),
            b't' if prefix_of("true") => return Ok(true),
            b'y' if prefix_of("yes") => return Ok(true),
            b'o' if t.len() > 1 && prefix_of("on") => return Ok(true),
            b'o' if t.len() > 1 && prefix_of("off") => return Ok(false),
            _ => {}
        }
        let src = t.as_bytes();
        if looks_like_int(src, true) {
            if let Ok((n, len)) = scan_int(src) {
                if only_blanks_from(src, len) {
                    return Ok(n != 0);
                }
            }
        } else if let Ok((d, len)) = scan_double(src) {
            if only_blanks_from(src, len) {
                return Ok(d != 0.0);
            }
        }
    }
    Err(TclError::runtime(format!(
        "expected boolean value but got \"{s}\""
    )))
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Format a double the way Tcl prints it: shortest round-trip digits,
/// exponent form outside `1e-4 ..= 1e16`, and a trailing `.0` on integral
/// values so the result still reads back as a double.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_owned();
    }
    if d.is_infinite() {
        return if d > 0.0 { "Inf" } else { "-Inf" }.to_owned();
    }
    let sci = format!("{d:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..17).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.abs());
    }
    let mut s = format!("{d}");
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

// ── Tests ─────────────────────────────────────────────────────────────────────
