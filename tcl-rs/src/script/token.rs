//! Token and parse-result types produced by the command tokenizer.
//!
//! Tokens form a flat vector. A composite token (`Word`, `SimpleWord`,
//! `VariableSub`) is followed immediately by its `components` tokens, which
//! may themselves be composite.

/// Kind tag carried by every [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A command word that needs substitution.
    Word,
    /// A word made of exactly one `Text` component.
    SimpleWord,
    Text,
    /// A backslash sequence; the range covers the whole escape.
    Backslash,
    /// `[script]`; the range includes both brackets.
    CommandSub,
    /// `$name` / `${name}` / `$name(index)`. The first component is the name,
    /// the rest make up the index.
    VariableSub,
    /// Reserved for expression token streams; the command tokenizer never
    /// produces it.
    SubExpr,
    /// Reserved for expression token streams, like `SubExpr`.
    Operator,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Word => "word",
            TokenKind::SimpleWord => "simple",
            TokenKind::Text => "text",
            TokenKind::Backslash => "backslash",
            TokenKind::CommandSub => "command",
            TokenKind::VariableSub => "variable",
            TokenKind::SubExpr => "subexpr",
            TokenKind::Operator => "operator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
    pub components: usize,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, len: usize) -> Self {
        Token {
            kind,
            start,
            len,
            components: 0,
        }
    }

    pub fn text(start: usize, len: usize) -> Self {
        Token::new(TokenKind::Text, start, len)
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// The source text this token covers.
    pub fn source<'s>(&self, script: &'s str) -> &'s str {
        &script[self.start..self.end()]
    }
}

// ── CommandParse ──────────────────────────────────────────────────────────────

/// Result of parsing one command. Built fresh for every command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandParse {
    /// `(start, len)` of the leading comment block, if any.
    pub comment: Option<(usize, usize)>,
    pub command_start: usize,
    /// Includes the terminator, so `command_start + command_len` is where
    /// the next command begins.
    pub command_len: usize,
    /// Offset of the terminating character, or the end of input.
    pub term: usize,
    /// A backslash-newline (or an open comment inside brackets) ran into the
    /// end of input.
    pub incomplete: bool,
    pub tokens: Vec<Token>,
    pub num_words: usize,
}

impl CommandParse {
    pub(crate) fn new(start: usize) -> Self {
        CommandParse {
            command_start: start,
            term: start,
            ..Default::default()
        }
    }

    pub fn next_start(&self) -> usize {
        self.command_start + self.command_len
    }

    /// The command text, terminator included.
    pub fn command_text<'s>(&self, script: &'s str) -> &'s str {
        &script[self.command_start..self.next_start()]
    }

    /// Iterate words as `(word token, component tokens)`.
    pub fn words(&self) -> Components<'_> {
        Components {
            tokens: &self.tokens,
            pos: 0,
        }
    }

    /// One line per token: kind, source text, component count.
    pub fn dump(&self, script: &str) -> String {
        let mut out = String::new();
        for tok in &self.tokens {
            out.push_str(&format!(
                "{} {{{}}} {}\n",
                tok.kind.name(),
                tok.source(script),
                tok.components
            ));
        }
        out
    }
}

/// Walks a token slice one composite at a time.
pub struct Components<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Components<'a> {
    pub fn over(tokens: &'a [Token]) -> Self {
        Components { tokens, pos: 0 }
    }
}

impl<'a> Iterator for Components<'a> {
    type Item = (Token, &'a [Token]);

    fn next(&mut self) -> Option<Self::Item> {
        let head = *self.tokens.get(self.pos)?;
        let first = self.pos + 1;
        let last = (first + head.components).min(self.tokens.len());
        self.pos = last;
        Some((head, &self.tokens[first..last]))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_walk_composites() {
        let toks = vec![
            Token {
                kind: TokenKind::Word,
                start: 0,
                len: 4,
                components: 3,
            },
            Token::text(0, 1),
            Token {
                kind: TokenKind::VariableSub,
                start: 1,
                len: 3,
                components: 1,
            },
            Token::text(2, 2),
            Token {
                kind: TokenKind::SimpleWord,
                start: 5,
                len: 1,
                components: 1,
            },
            Token::text(5, 1),
        ];
        let words: Vec<_> = Components::over(&toks).collect();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].1.len(), 3);
        assert_eq!(words[1].0.kind, TokenKind::SimpleWord);
        assert_eq!(words[1].1, &[Token::text(5, 1)]);
    }

    #[test]
    fn token_source() {
        let t = Token::text(4, 3);
        assert_eq!(t.source("set abc 1"), "abc");
        assert_eq!(t.end(), 7);
    }
}
