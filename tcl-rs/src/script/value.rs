//! Expression values.
//!
//! Every value is a string at heart, but `expr` works on a three-way
//! tagged value: integer, double or string. An [`ExprValue`] also remembers
//! the text it was parsed from, so `0x10` keeps printing as `0x10` until an
//! operator replaces it with a computed result.

use std::borrow::Cow;
use std::fmt;

use super::number::{format_double, looks_like_int, scan_double, scan_int};

/// A typed expression operand or result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(x) => f.write_str(&format_double(*x)),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value as a double; integers widen, strings have none.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Double(x) => Some(*x),
            Value::Str(_) => None,
        }
    }

    /// Wording used in "can't use ... as operand" messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Double(_) => "floating-point value",
            Value::Str(_) => "non-numeric string",
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

// ── ExprValue ─────────────────────────────────────────────────────────────────

/// A [`Value`] plus the source text it came from, if any.
///
/// Operators overwrite the left operand in place through [`set`](Self::set),
/// which drops the cached text so the new result prints canonically.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExprValue {
    value: Value,
    rep: Option<String>,
}

impl ExprValue {
    pub fn int(n: i64) -> Self {
        Value::Int(n).into()
    }

    pub fn double(x: f64) -> Self {
        Value::Double(x).into()
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into()).into()
    }

    /// Attach the literal text this value was scanned from.
    pub fn with_rep(mut self, rep: impl Into<String>) -> Self {
        if !matches!(self.value, Value::Str(_)) {
            self.rep = Some(rep.into());
        }
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Replace the value, discarding any cached text.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value = value.into();
        self.rep = None;
    }

    pub fn is_string(&self) -> bool {
        matches!(self.value, Value::Str(_))
    }

    /// The string form: cached source text if present, else canonical.
    pub fn string_rep(&self) -> Cow<'_, str> {
        match (&self.rep, &self.value) {
            (Some(rep), _) => Cow::Borrowed(rep),
            (None, Value::Str(s)) => Cow::Borrowed(s),
            (None, v) => Cow::Owned(v.to_string()),
        }
    }

    pub fn into_string(self) -> String {
        match (self.rep, self.value) {
            (Some(rep), _) => rep,
            (None, Value::Str(s)) => s,
            (None, v) => v.to_string(),
        }
    }

    /// Classify substituted text: an integer or double if the whole string
    /// (ignoring trailing blanks) scans as one, otherwise a string. Numeric
    /// results keep `s` as their string form.
    pub fn parse_string(s: &str) -> Self {
        let src = s.as_bytes();
        if src.is_empty() {
            return Self::string("");
        }
        let trailing_blanks = |len: usize| src[len..].iter().all(u8::is_ascii_whitespace);
        if looks_like_int(src, false) {
            if let Ok((n, len)) = scan_int(src) {
                if trailing_blanks(len) {
                    return Self::int(n).with_rep(s);
                }
            }
        } else if let Ok((x, len)) = scan_double(src) {
            if trailing_blanks(len) {
                return Self::double(x).with_rep(s);
            }
        }
        Self::string(s)
    }
}

impl From<Value> for ExprValue {
    fn from(value: Value) -> Self {
        ExprValue { value, rep: None }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_rep())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Double(3.5).to_string(), "3.5");
        assert_eq!(Value::Double(2.0).to_string(), "2.0");
        assert_eq!(Value::Str("hello".into()).to_string(), "hello");
    }

    #[test]
    fn parse_string_classifies() {
        assert_eq!(ExprValue::parse_string("42").value(), &Value::Int(42));
        assert_eq!(ExprValue::parse_string(" 42 ").value(), &Value::Int(42));
        assert_eq!(ExprValue::parse_string("0x10").value(), &Value::Int(16));
        assert_eq!(ExprValue::parse_string("010").value(), &Value::Int(8));
        assert_eq!(ExprValue::parse_string("1.5").value(), &Value::Double(1.5));
        assert_eq!(ExprValue::parse_string("1e3").value(), &Value::Double(1000.0));
        assert!(ExprValue::parse_string("12abc").is_string());
        assert!(ExprValue::parse_string("").is_string());
        assert!(ExprValue::parse_string("abc").is_string());
        // Out-of-range integers stay strings rather than erroring here.
        assert!(ExprValue::parse_string("99999999999999999999").is_string());
    }

    #[test]
    fn cached_rep_survives_until_set() {
        let mut v = ExprValue::parse_string("0x10");
        assert_eq!(v.string_rep(), "0x10");
        v.set(17);
        assert_eq!(v.string_rep(), "17");
        assert_eq!(ExprValue::parse_string("1.0").to_string(), "1.0");
        assert_eq!(ExprValue::double(1.0).to_string(), "1.0");
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Double(0.0).type_name(), "floating-point value");
        assert_eq!(Value::Str(String::new()).type_name(), "non-numeric string");
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = true.into();
        assert_eq!(v, Value::Int(1));
        assert_eq!(v.as_double(), Some(1.0));
    }
}
