//! Backslash sequence decoding.

/// One decoded backslash sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backslash {
    pub ch: char,
    /// Source bytes consumed, including the leading `\`.
    pub consumed: usize,
}

/// Decode the sequence starting at `src[at]`, which must be a backslash.
/// `src` ends where the sequence may no longer extend.
pub fn decode(src: &[u8], at: usize) -> Backslash {
    let end = src.len();
    let mut i = at + 1;
    if i >= end {
        return Backslash { ch: '\\', consumed: 1 };
    }
    let simple = |ch: char| Backslash { ch, consumed: 2 };
    match src[i] {
        b'a' => simple('\u{7}'),
        b'b' => simple('\u{8}'),
        b'f' => simple('\u{c}'),
        b'n' => simple('\n'),
        b'r' => simple('\r'),
        b't' => simple('\t'),
        b'v' => simple('\u{b}'),
        b'x' => {
            let (value, digits) = scan_hex(&src[i + 1..], usize::MAX);
            if digits == 0 {
                return simple('x');
            }
            Backslash {
                ch: char::from((value & 0xff) as u8),
                consumed: 2 + digits,
            }
        }
        b'u' => {
            let (value, digits) = scan_hex(&src[i + 1..], 4);
            if digits == 0 {
                return simple('u');
            }
            Backslash {
                ch: char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER),
                consumed: 2 + digits,
            }
        }
        b'\r' | b'\n' => {
            if src[i] == b'\r' && src.get(i + 1) == Some(&b'\n') {
                i += 1;
            }
            i += 1;
            while i < end && (src[i] == b' ' || src[i] == b'\t') {
                i += 1;
            }
            Backslash {
                ch: ' ',
                consumed: i - at,
            }
        }
        0 => simple('\\'),
        b'0'..=b'7' => {
            let mut value = u32::from(src[i] - b'0');
            i += 1;
            for _ in 0..2 {
                match src.get(i) {
                    Some(&d @ b'0'..=b'7') => {
                        value = value * 8 + u32::from(d - b'0');
                        i += 1;
                    }
                    _ => break,
                }
            }
            Backslash {
                ch: char::from((value & 0xff) as u8),
                consumed: i - at,
            }
        }
        _ => {
            let (ch, len) = decode_char(src, i);
            Backslash {
                ch,
                consumed: 1 + len,
            }
        }
    }
}

/// Accumulate up to `max` hex digits. The value keeps only what fits in 32
/// bits; callers mask it further.
fn scan_hex(src: &[u8], max: usize) -> (u32, usize) {
    let mut value: u32 = 0;
    let mut n = 0;
    while n < max {
        let Some(d) = src.get(n).and_then(|b| (*b as char).to_digit(16)) else {
            break;
        };
        value = value.wrapping_mul(16).wrapping_add(d);
        n += 1;
    }
    (value, n)
}

/// Decode the UTF-8 character starting at `src[at]`.
pub(crate) fn decode_char(src: &[u8], at: usize) -> (char, usize) {
    let len = match src[at] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    };
    let stop = (at + len).min(src.len());
    match std::str::from_utf8(&src[at..stop]).ok().and_then(|s| s.chars().next()) {
        Some(ch) => (ch, ch.len_utf8()),
        None => (char::REPLACEMENT_CHARACTER, 1),
    }
}

/// Decode every backslash sequence in `s`, leaving other text as is.
pub fn subst_backslashes(s: &str) -> String {
    let src = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut run = 0;
    while i < src.len() {
        if src[i] == b'\\' {
            out.push_str(&s[run..i]);
            let bs = decode(src, i);
            out.push(bs.ch);
            i += bs.consumed;
            run = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&s[run..]);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(s: &str) -> (char, usize) {
        let b = decode(s.as_bytes(), 0);
        (b.ch, b.consumed)
    }

    #[test]
    fn control_escapes() {
        assert_eq!(bs("\\n"), ('\n', 2));
        assert_eq!(bs("\\t"), ('\t', 2));
        assert_eq!(bs("\\a"), ('\u{7}', 2));
        assert_eq!(bs("\\b"), ('\u{8}', 2));
        assert_eq!(bs("\\f"), ('\u{c}', 2));
        assert_eq!(bs("\\r"), ('\r', 2));
        assert_eq!(bs("\\v"), ('\u{b}', 2));
    }

    #[test]
    fn hex_escapes() {
        assert_eq!(bs("\\x41"), ('A', 4));
        // Only the low byte of a long run survives.
        assert_eq!(bs("\\x12341"), ('A', 7));
        assert_eq!(bs("\\xg"), ('x', 2));
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(bs("\\u0041"), ('A', 6));
        assert_eq!(bs("\\u00e9z"), ('é', 6));
        assert_eq!(bs("\\u41"), ('A', 4));
        assert_eq!(bs("\\u00411"), ('A', 6));
        assert_eq!(bs("\\uq"), ('u', 2));
    }

    #[test]
    fn octal_escapes() {
        assert_eq!(bs("\\101"), ('A', 4));
        assert_eq!(bs("\\0"), ('\0', 2));
        assert_eq!(bs("\\18"), ('\u{1}', 2));
        assert_eq!(bs("\\1011"), ('A', 4));
        // 0o777 masked to 8 bits.
        assert_eq!(bs("\\777"), ('\u{ff}', 4));
    }

    #[test]
    fn newline_collapses_with_following_blanks() {
        assert_eq!(bs("\\\n   x"), (' ', 5));
        assert_eq!(bs("\\\r\n\tx"), (' ', 4));
        assert_eq!(bs("\\\rx"), (' ', 2));
    }

    #[test]
    fn trailing_and_literal() {
        assert_eq!(bs("\\"), ('\\', 1));
        assert_eq!(bs("\\\0"), ('\\', 2));
        assert_eq!(bs("\\q"), ('q', 2));
        assert_eq!(bs("\\$"), ('$', 2));
        assert_eq!(bs("\\é"), ('é', 3));
    }

    #[test]
    fn limited_by_slice_end() {
        let src = b"\\101";
        let b = decode(&src[..3], 0);
        assert_eq!((b.ch, b.consumed), ('\u{8}', 3));
    }

    #[test]
    fn subst_whole_string() {
        assert_eq!(subst_backslashes("a\\tb\\x41"), "a\tbA");
        assert_eq!(subst_backslashes("plain"), "plain");
    }
}
