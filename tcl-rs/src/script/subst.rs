//! Word substitution and command evaluation.
//!
//! Turns the tokens produced by [`super::parser`] into strings: literal text
//! is copied, backslash escapes are decoded, `$var` references are read
//! through the [`EvalContext`] and `[...]` substitutions are evaluated as
//! scripts. Each command's substituted words go to
//! [`EvalContext::invoke`].

use tracing::trace;

use super::backslash;
use super::expr::EvalContext;
use super::parser::{parse_command, parse_tokens, parse_var_name};
use super::stack::ensure_sufficient_stack;
use super::token::{CommandParse, Components, Token, TokenKind};
use crate::error::{ParseErrorKind, TclError, TclResult};

/// Evaluate every command in `script`; the result is the last command's.
pub fn eval_script(ctx: &mut dyn EvalContext, script: &str) -> TclResult<String> {
    eval_commands(ctx, script, 0, false).map(|(result, _)| result)
}

/// Evaluate the commands of a `[...]` substitution. `start` is just past the
/// `[`; returns the result and the offset just past the matching `]`.
pub fn eval_nested(
    ctx: &mut dyn EvalContext,
    script: &str,
    start: usize,
) -> TclResult<(String, usize)> {
    eval_commands(ctx, script, start, true)
}

/// Perform backslash, variable and command substitution on `text` as a
/// whole, as the `subst` command does.
pub fn subst(ctx: &mut dyn EvalContext, text: &str) -> TclResult<String> {
    let tokens = parse_tokens(text, 0, text.len())?;
    eval_tokens(ctx, text, &tokens)
}

/// Parse the variable reference whose `$` is at `start` and read it.
/// Returns the value and the number of bytes the reference occupies.
pub fn parse_var(ctx: &mut dyn EvalContext, script: &str, start: usize) -> TclResult<(String, usize)> {
    let (tokens, next) = parse_var_name(script, start)?;
    let value = eval_tokens(ctx, script, &tokens)?;
    Ok((value, next - start))
}

fn eval_commands(
    ctx: &mut dyn EvalContext,
    script: &str,
    mut start: usize,
    nested: bool,
) -> TclResult<(String, usize)> {
    ensure_sufficient_stack(|| {
        let mut result = String::new();
        loop {
            if start >= script.len() {
                if nested {
                    return Err(TclError::syntax(
                        ParseErrorKind::MissingBracket,
                        start,
                        "missing close-bracket",
                    ));
                }
                return Ok((result, start));
            }
            let parse = parse_command(script, start, None, nested)?;
            let next = parse.next_start();
            if parse.num_words > 0 {
                result = run_command(ctx, script, &parse)?;
            }
            if nested && script.as_bytes().get(parse.term) == Some(&b']') {
                return Ok((result, next));
            }
            if next <= start {
                return Ok((result, script.len()));
            }
            start = next;
        }
    })
}

fn run_command(ctx: &mut dyn EvalContext, script: &str, parse: &CommandParse) -> TclResult<String> {
    let outcome = eval_words(ctx, script, parse).and_then(|words| {
        trace!(command = %words[0], args = words.len() - 1, "invoking");
        ctx.invoke(words)
    });
    if let Err(err) = &outcome {
        let end = parse.term.min(script.len());
        let text = script[parse.command_start..end].trim_end();
        ctx.record_error(err, text);
    }
    outcome
}

/// Substitute every word of a parsed command.
pub fn eval_words(
    ctx: &mut dyn EvalContext,
    script: &str,
    parse: &CommandParse,
) -> TclResult<Vec<String>> {
    let mut words = Vec::with_capacity(parse.num_words);
    for (word, components) in parse.words() {
        let text = match (word.kind, components) {
            (TokenKind::SimpleWord, [text, ..]) => text.source(script).to_owned(),
            _ => eval_tokens(ctx, script, components)?,
        };
        words.push(text);
    }
    Ok(words)
}

/// Concatenate the substituted values of a token sequence.
pub fn eval_tokens(
    ctx: &mut dyn EvalContext,
    script: &str,
    tokens: &[Token],
) -> TclResult<String> {
    let mut out = String::new();
    for (tok, components) in Components::over(tokens) {
        match tok.kind {
            TokenKind::Text => out.push_str(tok.source(script)),
            TokenKind::Backslash => {
                out.push(backslash::decode(script.as_bytes(), tok.start).ch);
            }
            TokenKind::CommandSub => {
                let inner = &script[tok.start + 1..tok.end() - 1];
                out.push_str(&eval_script(ctx, inner)?);
            }
            TokenKind::VariableSub => {
                let name = components.first().map_or("", |t| t.source(script));
                let source = tok.source(script);
                let index = if source.ends_with(')') && !source.starts_with("${") {
                    Some(eval_tokens(ctx, script, components.get(1..).unwrap_or(&[]))?)
                } else {
                    None
                };
                out.push_str(&ctx.get_var(name, index.as_deref())?);
            }
            TokenKind::Word | TokenKind::SimpleWord | TokenKind::SubExpr | TokenKind::Operator => {
                out.push_str(&eval_tokens(ctx, script, components)?);
            }
        }
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
