//! Command tokenizer.
//!
//! Parses Tcl command text into a flat [`Token`] vector: one command per
//! call to [`parse_command`], with brace, quote and bare words, `$var`
//! references, `[...]` command substitutions and backslash escapes split
//! out as separate tokens. Nothing here evaluates anything; see
//! [`super::subst`] for turning tokens into strings.

use tracing::trace;

use super::backslash::{self, Backslash};
use super::chars::{char_type, is_normal, is_space, CharType};
use super::stack::ensure_sufficient_stack;
use super::token::{CommandParse, Token, TokenKind};
use crate::error::{ParseErrorKind, TclError, TclResult};

/// Deepest `[` nesting the tokenizer will follow.
pub const MAX_BRACKET_DEPTH: usize = 1000;

// ── Public entry points ───────────────────────────────────────────────────────

/// Parse the command beginning at `start`.
///
/// `num_bytes` limits the scan (`None` means to the end of `script`). With
/// `nested`, an unescaped `]` also terminates the command and running out
/// of input is a missing-bracket error.
pub fn parse_command(
    script: &str,
    start: usize,
    num_bytes: Option<usize>,
    nested: bool,
) -> TclResult<CommandParse> {
    let end = num_bytes.map_or(script.len(), |n| start.saturating_add(n));
    Scanner::new(script, end).command(start, nested)
}

/// Parse a `$name`, `${name}` or `$name(index)` reference at `start`.
/// Returns the tokens (a `VariableSub` and its components, or a single
/// `Text` token for a bare `$`) and the offset just past the reference.
pub fn parse_var_name(script: &str, start: usize) -> TclResult<(Vec<Token>, usize)> {
    let scan = Scanner::new(script, script.len());
    let mut p = CommandParse::new(start);
    let next = scan.var_name(&mut p, start)?;
    Ok((p.tokens, next))
}

/// Parse a brace-quoted string whose `{` is at `start`. Returns the text
/// and backslash-newline tokens and the offset just past the close brace.
pub fn parse_braces(script: &str, start: usize) -> TclResult<(Vec<Token>, usize)> {
    let scan = Scanner::new(script, script.len());
    let mut p = CommandParse::new(start);
    let next = scan.brace_word(&mut p, start)?;
    Ok((p.tokens, next))
}

/// Parse a double-quoted string whose `"` is at `start`. Returns the tokens
/// and the offset just past the close quote.
pub fn parse_quoted_string(script: &str, start: usize) -> TclResult<(Vec<Token>, usize)> {
    let scan = Scanner::new(script, script.len());
    let mut p = CommandParse::new(start);
    let term = scan.tokens(&mut p, start + 1, CharType::QUOTE)?;
    if scan.byte(term) != Some(b'"') {
        return Err(missing_quote(start));
    }
    Ok((p.tokens, term + 1))
}

/// Split `script[start..end]` into substitution tokens with no terminator
/// other than the end of the range. Used for `subst`-style evaluation.
pub fn parse_tokens(script: &str, start: usize, end: usize) -> TclResult<Vec<Token>> {
    let scan = Scanner::new(script, end);
    let mut p = CommandParse::new(start);
    scan.tokens(&mut p, start, CharType::empty())?;
    Ok(p.tokens)
}

/// Find the end of a `[...]` command substitution without evaluating it.
/// `start` is just past the `[`; returns the offset just past the `]`.
pub fn skip_bracketed(script: &str, start: usize) -> TclResult<usize> {
    Scanner::new(script, script.len()).bracketed(start)
}

/// Parse every command in `script`, skipping blank and comment-only ones.
pub fn parse_script(script: &str) -> TclResult<Vec<CommandParse>> {
    let mut commands = Vec::new();
    let mut start = 0;
    while start < script.len() {
        let parse = parse_command(script, start, None, false)?;
        let next = parse.next_start();
        if parse.num_words > 0 {
            commands.push(parse);
        }
        if next <= start {
            break;
        }
        start = next;
    }
    Ok(commands)
}

/// True unless the script ends inside an open brace, quote, bracket or
/// backslash-newline. A script with a non-incompleteness syntax error
/// counts as complete: more input would not fix it.
pub fn commands_complete(script: &str) -> bool {
    let mut start = 0;
    loop {
        match parse_command(script, start, None, false) {
            Err(e) => return !e.is_incomplete(),
            Ok(p) => {
                let next = p.next_start();
                if p.incomplete {
                    return false;
                }
                if next >= script.len() || next <= start {
                    return true;
                }
                start = next;
            }
        }
    }
}

/// True when every command in `script` parses without error.
pub fn is_parseable(script: &str, nested: bool) -> bool {
    let mut start = 0;
    loop {
        match parse_command(script, start, None, nested) {
            Err(_) => return false,
            Ok(p) => {
                let next = p.next_start();
                if next >= script.len() || next <= start {
                    return true;
                }
                start = next;
            }
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

fn missing_bracket(offset: usize) -> TclError {
    TclError::syntax(ParseErrorKind::MissingBracket, offset, "missing close-bracket")
}

fn missing_quote(offset: usize) -> TclError {
    TclError::syntax(ParseErrorKind::MissingQuote, offset, "missing \"")
}

// ── Scanner ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Scanner<'a> {
    src: &'a [u8],
    end: usize,
    depth: usize,
}

impl<'a> Scanner<'a> {
    fn new(script: &'a str, end: usize) -> Self {
        let mut end = end.min(script.len());
        while !script.is_char_boundary(end) {
            end -= 1;
        }
        Scanner {
            src: script.as_bytes(),
            end,
            depth: 0,
        }
    }

    fn byte(&self, i: usize) -> Option<u8> {
        if i < self.end {
            Some(self.src[i])
        } else {
            None
        }
    }

    /// Length of a `\n` or `\r\n` sequence at `i`.
    fn eol_len(&self, i: usize) -> usize {
        match (self.byte(i), self.byte(i + 1)) {
            (Some(b'\n'), _) => 1,
            (Some(b'\r'), Some(b'\n')) => 2,
            _ => 0,
        }
    }

    fn backslash(&self, i: usize) -> Backslash {
        backslash::decode(&self.src[..self.end], i)
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn command(&self, start: usize, nested: bool) -> TclResult<CommandParse> {
        let terminators = if nested {
            CharType::COMMAND_END | CharType::CLOSE_BRACK
        } else {
            CharType::COMMAND_END
        };
        let mut p = CommandParse::new(start);
        let mut i = self.skip_comments(&mut p, start, nested);

        p.command_start = i;
        p.term = self.end;
        loop {
            // Blanks and backslash-newlines between words.
            loop {
                match self.byte(i) {
                    Some(c) if is_space(c) => i += 1,
                    Some(b'\\') if self.eol_len(i + 1) > 0 => {
                        if i + 1 + self.eol_len(i + 1) == self.end {
                            p.incomplete = true;
                        }
                        i += self.backslash(i).consumed;
                    }
                    _ => break,
                }
            }
            match self.byte(i) {
                None => {
                    if nested {
                        return Err(missing_bracket(i));
                    }
                    break;
                }
                Some(c) if char_type(c).intersects(terminators) => {
                    p.term = i;
                    i += 1;
                    break;
                }
                Some(_) => {}
            }

            let word_index = p.tokens.len();
            p.tokens.push(Token::new(TokenKind::Word, i, 0));
            p.num_words += 1;
            i = match self.src[i] {
                b'"' => {
                    let term = self.tokens(&mut p, i + 1, CharType::QUOTE)?;
                    if self.byte(term) != Some(b'"') {
                        return Err(missing_quote(i));
                    }
                    term + 1
                }
                b'{' => self.brace_word(&mut p, i)?,
                _ => self.tokens(&mut p, i, CharType::SPACE | terminators)?,
            };
            let components = p.tokens.len() - word_index - 1;
            let simple = components == 1 && p.tokens[word_index + 1].kind == TokenKind::Text;
            let word = &mut p.tokens[word_index];
            word.len = i - word.start;
            word.components = components;
            if simple {
                word.kind = TokenKind::SimpleWord;
            }

            let scanned = self.white_space(&mut p, i);
            if scanned > 0 {
                i += scanned;
                continue;
            }
            match self.byte(i) {
                Some(c) if char_type(c).intersects(terminators) => {
                    p.term = i;
                    i += 1;
                    break;
                }
                None => {
                    if nested {
                        return Err(missing_bracket(i));
                    }
                    break;
                }
                Some(_) => {
                    return Err(if self.src[i - 1] == b'"' {
                        TclError::syntax(
                            ParseErrorKind::QuoteExtra,
                            i,
                            "extra characters after close-quote",
                        )
                    } else {
                        TclError::syntax(
                            ParseErrorKind::BraceExtra,
                            i,
                            "extra characters after close-brace",
                        )
                    });
                }
            }
        }
        p.command_len = i - p.command_start;
        trace!(
            start = p.command_start,
            len = p.command_len,
            words = p.num_words,
            "parsed command"
        );
        Ok(p)
    }

    /// Skip blank lines and `#` comments ahead of a command. Returns the
    /// offset of the first word.
    fn skip_comments(&self, p: &mut CommandParse, mut i: usize, nested: bool) -> usize {
        loop {
            while let Some(c) = self.byte(i) {
                if is_space(c) || c == b'\n' {
                    i += 1;
                } else {
                    break;
                }
            }
            if self.byte(i) == Some(b'\\') {
                let eol = self.eol_len(i + 1);
                if eol > 0 {
                    if i + 1 + eol == self.end {
                        p.incomplete = true;
                    }
                    i += 1 + eol;
                    continue;
                }
            }
            if self.byte(i) != Some(b'#') {
                return i;
            }
            let comment_start = p.comment.map_or(i, |(start, _)| start);
            loop {
                match self.byte(i) {
                    None => {
                        if nested {
                            p.incomplete = true;
                        }
                        break;
                    }
                    Some(b'\\') => {
                        let eol = self.eol_len(i + 1);
                        if eol > 0 && i + 1 + eol == self.end {
                            p.incomplete = true;
                        }
                        i += self.backslash(i).consumed;
                    }
                    Some(b'\n') => {
                        i += 1;
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
            p.comment = Some((comment_start, i - comment_start));
        }
    }

    /// Count blanks and backslash-newlines at `i`.
    fn white_space(&self, p: &mut CommandParse, start: usize) -> usize {
        let mut i = start;
        loop {
            match self.byte(i) {
                Some(c) if is_space(c) => i += 1,
                Some(b'\\') => {
                    let eol = self.eol_len(i + 1);
                    if eol == 0 {
                        break;
                    }
                    if i + 1 + eol == self.end {
                        p.incomplete = true;
                    }
                    i += 1 + eol;
                }
                _ => break,
            }
        }
        i - start
    }

    // ── Words ─────────────────────────────────────────────────────────────────

    /// Brace word starting at the `{` at `open`. Appends text tokens, with
    /// each backslash-newline split out as its own token. Returns the offset
    /// past the matching `}`.
    fn brace_word(&self, p: &mut CommandParse, open: usize) -> TclResult<usize> {
        let first = p.tokens.len();
        let mut text_start = open + 1;
        let mut i = open + 1;
        let mut level = 1;
        loop {
            while self.byte(i).is_some_and(is_normal) {
                i += 1;
            }
            match self.byte(i) {
                None => return Err(self.missing_brace(open)),
                Some(b'}') => {
                    level -= 1;
                    if level == 0 {
                        break;
                    }
                    i += 1;
                }
                Some(b'{') => {
                    level += 1;
                    i += 1;
                }
                Some(b'\\') => {
                    let eol = self.eol_len(i + 1);
                    let bs = self.backslash(i);
                    if eol > 0 {
                        if i + 1 + eol == self.end {
                            p.incomplete = true;
                        }
                        if i > text_start {
                            p.tokens.push(Token::text(text_start, i - text_start));
                        }
                        p.tokens
                            .push(Token::new(TokenKind::Backslash, i, bs.consumed));
                        text_start = i + bs.consumed;
                    }
                    i += bs.consumed;
                }
                Some(_) => i += 1,
            }
        }
        if i != text_start || p.tokens.len() == first {
            p.tokens.push(Token::text(text_start, i - text_start));
        }
        Ok(i + 1)
    }

    /// Unterminated brace. Adds a hint when an open brace sits inside what
    /// looks like a comment, the usual cause.
    fn missing_brace(&self, open: usize) -> TclError {
        let mut message = String::from("missing close-brace");
        let mut open_brace = false;
        let mut i = self.end;
        while i > open + 1 {
            i -= 1;
            match self.src[i] {
                b'{' => open_brace = true,
                b'\n' => open_brace = false,
                b'#' if open_brace && self.src[i - 1].is_ascii_whitespace() => {
                    message.push_str(": possible unbalanced brace in comment");
                    break;
                }
                _ => {}
            }
        }
        TclError::syntax(ParseErrorKind::MissingBrace, open, message)
    }

    // ── Substitution scanner ──────────────────────────────────────────────────

    /// Split text starting at `i` into literal and substitution tokens,
    /// stopping at any byte whose class intersects `mask` or at the end of
    /// input. Returns the stop offset.
    fn tokens(&self, p: &mut CommandParse, mut i: usize, mask: CharType) -> TclResult<usize> {
        let original = p.tokens.len();
        while let Some(c) = self.byte(i) {
            let ty = char_type(c);
            if ty.intersects(mask) {
                break;
            }
            if !ty.contains(CharType::SUBS) {
                let start = i;
                i += 1;
                while self
                    .byte(i)
                    .is_some_and(|c| !char_type(c).intersects(mask | CharType::SUBS))
                {
                    i += 1;
                }
                p.tokens.push(Token::text(start, i - start));
            } else if c == b'$' {
                i = self.var_name(p, i)?;
            } else if c == b'[' {
                let start = i;
                i = self.bracketed(i + 1)?;
                p.tokens
                    .push(Token::new(TokenKind::CommandSub, start, i - start));
            } else if c == b'\\' {
                let eol = self.eol_len(i + 1);
                if eol > 0 {
                    if i + 1 + eol == self.end {
                        p.incomplete = true;
                    }
                    if mask.contains(CharType::SPACE) {
                        break;
                    }
                }
                let bs = self.backslash(i);
                if bs.consumed == 1 {
                    p.tokens.push(Token::text(i, 1));
                } else {
                    p.tokens
                        .push(Token::new(TokenKind::Backslash, i, bs.consumed));
                }
                i += bs.consumed;
            } else {
                // Embedded NUL.
                p.tokens.push(Token::text(i, 1));
                i += 1;
            }
        }
        if p.tokens.len() == original {
            p.tokens.push(Token::text(i, 0));
        }
        Ok(i)
    }

    /// Parse nested commands from `i` (just past a `[`) through the matching
    /// `]`. Returns the offset past the `]`.
    fn bracketed(&self, mut i: usize) -> TclResult<usize> {
        if self.depth >= MAX_BRACKET_DEPTH {
            return Err(TclError::NestingLimit);
        }
        let inner = Scanner {
            depth: self.depth + 1,
            ..*self
        };
        let open = i - 1;
        loop {
            let nested = ensure_sufficient_stack(|| inner.command(i, true))?;
            i = nested.next_start();
            if i > 0 && self.src[i - 1] == b']' && !nested.incomplete {
                return Ok(i);
            }
            if i >= self.end {
                return Err(missing_bracket(open));
            }
        }
    }

    /// Variable reference at the `$` at `dollar`. Returns the offset past it.
    fn var_name(&self, p: &mut CommandParse, dollar: usize) -> TclResult<usize> {
        let var_index = p.tokens.len();
        p.tokens
            .push(Token::new(TokenKind::VariableSub, dollar, 0));
        let mut i = dollar + 1;

        match self.byte(i) {
            None => {
                p.tokens[var_index] = Token::text(dollar, 1);
                return Ok(i);
            }
            Some(b'{') => {
                i += 1;
                let name_start = i;
                loop {
                    match self.byte(i) {
                        None => {
                            return Err(TclError::syntax(
                                ParseErrorKind::MissingVarBrace,
                                name_start - 1,
                                "missing close-brace for variable name",
                            ))
                        }
                        Some(b'}') => break,
                        Some(_) => i += 1,
                    }
                }
                p.tokens.push(Token::text(name_start, i - name_start));
                i += 1;
            }
            Some(_) => {
                let name_start = i;
                i = self.name_end(i);
                if i == name_start {
                    p.tokens[var_index] = Token::text(dollar, 1);
                    return Ok(dollar + 1);
                }
                p.tokens.push(Token::text(name_start, i - name_start));
                if self.byte(i) == Some(b'(') {
                    let open = i;
                    let term = self.tokens(p, i + 1, CharType::CLOSE_PAREN)?;
                    if self.byte(term) != Some(b')') {
                        return Err(TclError::syntax(
                            ParseErrorKind::MissingParen,
                            open,
                            "missing )",
                        ));
                    }
                    i = term + 1;
                }
            }
        }

        let components = p.tokens.len() - var_index - 1;
        let var = &mut p.tokens[var_index];
        var.len = i - dollar;
        var.components = components;
        Ok(i)
    }

    /// End of a bare variable name: letters, digits, `_` and `::` runs.
    fn name_end(&self, mut i: usize) -> usize {
        while let Some(c) = self.byte(i) {
            if c.is_ascii_alphanumeric() || c == b'_' {
                i += 1;
            } else if c == b':' && self.byte(i + 1) == Some(b':') {
                i += 2;
                while self.byte(i) == Some(b':') {
                    i += 1;
                }
            } else if c >= 0x80 {
                let (ch, len) = backslash::decode_char(&self.src[..self.end], i);
                if !ch.is_alphanumeric() {
                    break;
                }
                i += len;
            } else {
                break;
            }
        }
        i
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
