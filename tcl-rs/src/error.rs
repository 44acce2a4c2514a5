//! Error taxonomy shared by the tokenizer, the expression evaluator and the
//! interpreter.
//!
//! | Variant            | Raised by                    | `errorCode`           |
//! |--------------------|------------------------------|-----------------------|
//! | `Syntax`           | tokenizer, expression lexer  | `NONE`                |
//! | `Type`             | operators, math functions    | `NONE`                |
//! | `Arith`            | arithmetic range/domain      | `ARITH <tag> {<msg>}` |
//! | `UnknownFunction`  | math-function lookup         | `NONE`                |
//! | `Arity`            | math-function calls          | `NONE`                |
//! | `NestingLimit`     | recursion guard              | `NONE`                |
//! | `Runtime`          | commands (`error`, `set`, …) | `NONE`                |

use thiserror::Error;

pub type TclResult<T> = Result<T, TclError>;

// ── Parse error kinds ─────────────────────────────────────────────────────────

/// Which syntactic construct went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    QuoteExtra,
    BraceExtra,
    MissingBrace,
    MissingBracket,
    MissingParen,
    MissingQuote,
    MissingVarBrace,
    Syntax,
    BadNumber,
}

impl ParseErrorKind {
    /// True when more input could complete the construct.
    pub fn is_incomplete(self) -> bool {
        matches!(
            self,
            ParseErrorKind::MissingBrace
                | ParseErrorKind::MissingBracket
                | ParseErrorKind::MissingParen
                | ParseErrorKind::MissingQuote
                | ParseErrorKind::MissingVarBrace
        )
    }
}

// ── Arithmetic codes ──────────────────────────────────────────────────────────

/// Machine-readable classification of a range or domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithCode {
    DivZero,
    IntOverflow,
    FloatOverflow,
    FloatUnderflow,
    Domain,
}

impl ArithCode {
    pub fn message(self) -> &'static str {
        match self {
            ArithCode::DivZero => "divide by zero",
            ArithCode::IntOverflow => "integer value too large to represent",
            ArithCode::FloatOverflow => "floating-point value too large to represent",
            ArithCode::FloatUnderflow => "floating-point value too small to represent",
            ArithCode::Domain => "domain error: argument not in valid range",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ArithCode::DivZero => "DIVZERO",
            ArithCode::IntOverflow => "IOVERFLOW",
            ArithCode::FloatOverflow => "OVERFLOW",
            ArithCode::FloatUnderflow => "UNDERFLOW",
            ArithCode::Domain => "DOMAIN",
        }
    }
}

// ── TclError ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TclError {
    /// Malformed construct; `offset` is where the parser gave up.
    #[error("{message}")]
    Syntax {
        kind: ParseErrorKind,
        offset: usize,
        message: String,
    },

    /// Illegal operand type, including the empty-string operand case.
    #[error("{0}")]
    Type(String),

    #[error("{}", .0.message())]
    Arith(ArithCode),

    #[error("unknown math function \"{0}\"")]
    UnknownFunction(String),

    #[error("{0}")]
    Arity(String),

    #[error("too many nested evaluations (infinite loop?)")]
    NestingLimit,

    #[error("{0}")]
    Runtime(String),
}

impl TclError {
    pub fn syntax(kind: ParseErrorKind, offset: usize, message: impl Into<String>) -> Self {
        TclError::Syntax {
            kind,
            offset,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        TclError::Runtime(message.into())
    }

    /// True for the "more input needed" subset of syntax errors.
    pub fn is_incomplete(&self) -> bool {
        match self {
            TclError::Syntax { kind, .. } => kind.is_incomplete(),
            _ => false,
        }
    }

    pub fn parse_kind(&self) -> Option<ParseErrorKind> {
        match self {
            TclError::Syntax { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The value published on the structured error-code channel.
    pub fn error_code(&self) -> String {
        match self {
            TclError::Arith(code) => format!("ARITH {} {{{}}}", code.tag(), code.message()),
            _ => "NONE".to_owned(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_kinds() {
        assert!(ParseErrorKind::MissingBrace.is_incomplete());
        assert!(ParseErrorKind::MissingVarBrace.is_incomplete());
        assert!(!ParseErrorKind::BraceExtra.is_incomplete());
        assert!(!ParseErrorKind::QuoteExtra.is_incomplete());
        assert!(!ParseErrorKind::Syntax.is_incomplete());
    }

    #[test]
    fn arith_error_code() {
        let e = TclError::Arith(ArithCode::IntOverflow);
        assert_eq!(e.to_string(), "integer value too large to represent");
        assert_eq!(
            e.error_code(),
            "ARITH IOVERFLOW {integer value too large to represent}"
        );
        assert_eq!(
            TclError::Arith(ArithCode::DivZero).error_code(),
            "ARITH DIVZERO {divide by zero}"
        );
    }

    #[test]
    fn non_arith_code_is_none() {
        let e = TclError::syntax(ParseErrorKind::MissingQuote, 3, "missing \"");
        assert_eq!(e.error_code(), "NONE");
        assert!(e.is_incomplete());
        assert_eq!(e.to_string(), "missing \"");
        assert_eq!(
            TclError::UnknownFunction("foo".into()).to_string(),
            "unknown math function \"foo\""
        );
    }
}
