//! Lexical character classes used by the command tokenizer.
//!
//! | Class         | Characters                       |
//! |---------------|----------------------------------|
//! | `SPACE`       | space, `\t`, `\v`, `\f`, `\r`    |
//! | `COMMAND_END` | `\n`, `;`                        |
//! | `SUBS`        | NUL, `$`, `[`, `\`               |
//! | `QUOTE`       | `"`                              |
//! | `CLOSE_PAREN` | `)`                              |
//! | `CLOSE_BRACK` | `]`                              |
//! | `BRACE`       | `{`, `}`                         |
//!
//! Everything else, including every byte above 127, is normal (empty set).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharType: u8 {
        const SPACE       = 0x01;
        const COMMAND_END = 0x02;
        const SUBS        = 0x04;
        const QUOTE       = 0x08;
        const CLOSE_PAREN = 0x10;
        const CLOSE_BRACK = 0x20;
        const BRACE       = 0x40;
    }
}

const fn build_table() -> [u8; 128] {
    let mut t = [0u8; 128];
    t[0] = CharType::SUBS.bits();
    t[b'$' as usize] = CharType::SUBS.bits();
    t[b'[' as usize] = CharType::SUBS.bits();
    t[b'\\' as usize] = CharType::SUBS.bits();
    t[b'\t' as usize] = CharType::SPACE.bits();
    t[0x0b] = CharType::SPACE.bits();
    t[0x0c] = CharType::SPACE.bits();
    t[b'\r' as usize] = CharType::SPACE.bits();
    t[b' ' as usize] = CharType::SPACE.bits();
    t[b'\n' as usize] = CharType::COMMAND_END.bits();
    t[b';' as usize] = CharType::COMMAND_END.bits();
    t[b'"' as usize] = CharType::QUOTE.bits();
    t[b')' as usize] = CharType::CLOSE_PAREN.bits();
    t[b']' as usize] = CharType::CLOSE_BRACK.bits();
    t[b'{' as usize] = CharType::BRACE.bits();
    t[b'}' as usize] = CharType::BRACE.bits();
    t
}

static TYPE_TABLE: [u8; 128] = build_table();

/// Classify one source byte.
#[inline]
pub fn char_type(b: u8) -> CharType {
    if b > 127 {
        CharType::empty()
    } else {
        CharType::from_bits_retain(TYPE_TABLE[b as usize])
    }
}

#[inline]
pub fn is_space(b: u8) -> bool {
    char_type(b).contains(CharType::SPACE)
}

/// No special meaning to the tokenizer.
#[inline]
pub fn is_normal(b: u8) -> bool {
    char_type(b).is_empty()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
