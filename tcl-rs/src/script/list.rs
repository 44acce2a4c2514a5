//! Tcl list parsing and formatting.
//!
//! A list is whitespace-separated elements, where an element may be
//! brace-quoted (taken literally), double-quoted or bare (both with
//! backslash escapes decoded).

use super::backslash;
use crate::error::{TclError, TclResult};

fn is_list_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Split `list` into its elements.
pub fn split_list(list: &str) -> TclResult<Vec<String>> {
    let src = list.as_bytes();
    let mut elements = Vec::new();
    let mut i = 0;
    loop {
        while i < src.len() && is_list_space(src[i]) {
            i += 1;
        }
        if i >= src.len() {
            return Ok(elements);
        }
        let (element, next) = match src[i] {
            b'{' => braced_element(list, i)?,
            b'"' => quoted_element(list, i)?,
            _ => bare_element(list, i),
        };
        elements.push(element);
        i = next;
    }
}

fn braced_element(list: &str, open: usize) -> TclResult<(String, usize)> {
    let src = list.as_bytes();
    let mut depth = 1;
    let mut i = open + 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let after = i + 1;
                    if after < src.len() && !is_list_space(src[after]) {
                        return Err(trailing_garbage("braces", list, after));
                    }
                    return Ok((list[open + 1..i].to_owned(), after));
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(TclError::runtime("unmatched open brace in list"))
}

fn quoted_element(list: &str, open: usize) -> TclResult<(String, usize)> {
    let src = list.as_bytes();
    let mut i = open + 1;
    while i < src.len() {
        match src[i] {
            b'\\' => i += backslash::decode(src, i).consumed,
            b'"' => {
                let after = i + 1;
                if after < src.len() && !is_list_space(src[after]) {
                    return Err(trailing_garbage("quotes", list, after));
                }
                let element = backslash::subst_backslashes(&list[open + 1..i]);
                return Ok((element, after));
            }
            _ => i += 1,
        }
    }
    Err(TclError::runtime("unmatched open quote in list"))
}

fn bare_element(list: &str, start: usize) -> (String, usize) {
    let src = list.as_bytes();
    let mut i = start;
    while i < src.len() && !is_list_space(src[i]) {
        if src[i] == b'\\' {
            i += backslash::decode(src, i).consumed;
        } else {
            i += 1;
        }
    }
    let i = i.min(src.len());
    (backslash::subst_backslashes(&list[start..i]), i)
}

fn trailing_garbage(what: &str, list: &str, at: usize) -> TclError {
    let rest: String = list[at..]
        .chars()
        .take_while(|c| !c.is_ascii_whitespace())
        .take(20)
        .collect();
    TclError::runtime(format!(
        "list element in {what} followed by \"{rest}\" instead of space"
    ))
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Quote one element so that [`split_list`] reads it back unchanged.
pub fn quote_element(element: &str) -> String {
    if element.is_empty() {
        return "{}".to_owned();
    }
    let special = |c: char| {
        c.is_ascii_whitespace()
            || matches!(c, '{' | '}' | '[' | ']' | '$' | ';' | '"' | '\\' | '\x0b')
    };
    if !element.contains(special) && !element.starts_with('#') {
        return element.to_owned();
    }
    if braces_balanced(element) && !element.ends_with('\\') {
        return format!("{{{element}}}");
    }
    let mut out = String::with_capacity(element.len() + 8);
    for c in element.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '{' | '}' | '[' | ']' | '$' | ';' | '"' | '\\' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    if out.starts_with('#') {
        out.insert(0, '\\');
    }
    out
}

fn braces_balanced(s: &str) -> bool {
    let mut depth = 0i32;
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'\\' => {
                bytes.next();
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Build a list from elements, quoting as needed.
pub fn merge_list<S: AsRef<str>>(elements: &[S]) -> String {
    elements
        .iter()
        .map(|e| quote_element(e.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
