//! Expression lexer and evaluator for `expr`.
//!
//! Evaluation is precedence climbing straight off the source text; no tree
//! is built. Operands are [`ExprValue`]s, and operators rewrite the left
//! operand in place.
//!
//! Operator precedence (lowest → highest):
//!
//! | Prec | Operators |
//! |------|-----------|
//! | 1 | `:` |
//! | 2 | `?` |
//! | 3 | `\|\|` |
//! | 4 | `&&` |
//! | 5 | `\|` |
//! | 6 | `^` |
//! | 7 | `&` |
//! | 8 | `==` `!=` `eq` `ne` `in` `ni` |
//! | 9 | `<` `>` `<=` `>=` |
//! | 10 | `<<` `>>` |
//! | 11 | `+` `-` |
//! | 12 | `*` `/` `%` |
//! | 13 | unary `-` `+` `!` `~` |
//!
//! Operands that cannot change the result of `&&`, `||` or `?:` are parsed
//! with `skip` set: their syntax is checked but no variable is read, no
//! command runs and no math function is called.

use tracing::{debug, trace};

use super::list;
use super::mathfunc::MathRegistry;
use super::number::{self, boolean_token, looks_like_int, scan_double, scan_int, ScanError};
use super::parser::{parse_braces, parse_quoted_string, parse_var_name, skip_bracketed};
use super::stack::ensure_sufficient_stack;
use super::subst;
use super::value::{ExprValue, Value};
use crate::error::{ArithCode, ParseErrorKind, TclError, TclResult};

/// Deepest operand nesting (parentheses, unary chains, function arguments)
/// the evaluator will follow.
pub const MAX_EXPR_DEPTH: usize = 1000;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Services the evaluator needs from its host.
///
/// An [`Interpreter`](super::interp::Interpreter) implements this trait to give
/// the evaluator access to variables, commands and math functions.
pub trait EvalContext {
    /// Read a scalar (`index` is `None`) or an array element.
    fn get_var(&mut self, name: &str, index: Option<&str>) -> TclResult<String>;

    /// Run a command given its fully substituted words.
    fn invoke(&mut self, words: Vec<String>) -> TclResult<String>;

    /// Split a string into list elements (used by `in` and `ni`).
    fn split_list(&mut self, list: &str) -> TclResult<Vec<String>> {
        list::split_list(list)
    }

    /// Interpret a string operand as a boolean.
    fn get_boolean(&mut self, s: &str) -> TclResult<bool> {
        number::get_boolean(s)
    }

    fn math(&mut self) -> &mut MathRegistry;

    /// Receive the machine-readable code of an arithmetic error.
    fn set_error_code(&mut self, _code: &str) {}

    /// Called once per command that fails, innermost first.
    fn record_error(&mut self, _err: &TclError, _command: &str) {}
}

// ── Operators ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Mult,
    Divide,
    Mod,
    Plus,
    Minus,
    LeftShift,
    RightShift,
    Less,
    Greater,
    Leq,
    Geq,
    Equal,
    Neq,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    Questy,
    Colon,
    StrEq,
    StrNeq,
    In,
    Ni,
    UnaryMinus,
    UnaryPlus,
    Not,
    BitNot,
}

impl Op {
    pub fn precedence(self) -> i32 {
        match self {
            Op::Mult | Op::Divide | Op::Mod => 12,
            Op::Plus | Op::Minus => 11,
            Op::LeftShift | Op::RightShift => 10,
            Op::Less | Op::Greater | Op::Leq | Op::Geq => 9,
            Op::Equal | Op::Neq | Op::StrEq | Op::StrNeq | Op::In | Op::Ni => 8,
            Op::BitAnd => 7,
            Op::BitXor => 6,
            Op::BitOr => 5,
            Op::And => 4,
            Op::Or => 3,
            Op::Questy => 2,
            Op::Colon => 1,
            Op::UnaryMinus | Op::UnaryPlus | Op::Not | Op::BitNot => 13,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Mult => "*",
            Op::Divide => "/",
            Op::Mod => "%",
            Op::Plus | Op::UnaryPlus => "+",
            Op::Minus | Op::UnaryMinus => "-",
            Op::LeftShift => "<<",
            Op::RightShift => ">>",
            Op::Less => "<",
            Op::Greater => ">",
            Op::Leq => "<=",
            Op::Geq => ">=",
            Op::Equal => "==",
            Op::Neq => "!=",
            Op::BitAnd => "&",
            Op::BitXor => "^",
            Op::BitOr => "|",
            Op::And => "&&",
            Op::Or => "||",
            Op::Questy => "?",
            Op::Colon => ":",
            Op::StrEq => "eq",
            Op::StrNeq => "ne",
            Op::In => "in",
            Op::Ni => "ni",
            Op::Not => "!",
            Op::BitNot => "~",
        }
    }

    fn is_unary(self) -> bool {
        matches!(self, Op::UnaryMinus | Op::UnaryPlus | Op::Not | Op::BitNot)
    }
}

// ── Tokens ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    Value,
    OpenParen,
    CloseParen,
    Comma,
    End,
    Unknown,
    Op(Op),
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Evaluate `expr` to a value.
pub fn eval_expr(ctx: &mut dyn EvalContext, expr: &str) -> TclResult<ExprValue> {
    debug!(expr, "evaluating expression");
    let result = ExprParser::new(&mut *ctx, expr).run();
    if let Err(err @ TclError::Arith(_)) = &result {
        ctx.set_error_code(&err.error_code());
    }
    result
}

/// Evaluate `expr` and return its string form, as the `expr` command does.
pub fn eval_expr_string(ctx: &mut dyn EvalContext, expr: &str) -> TclResult<String> {
    eval_expr(ctx, expr).map(ExprValue::into_string)
}

/// Evaluate `expr` as a condition (`if`, `while`).
pub fn eval_expr_boolean(ctx: &mut dyn EvalContext, expr: &str) -> TclResult<bool> {
    let value = eval_expr(ctx, expr)?;
    match value.value() {
        Value::Int(n) => Ok(*n != 0),
        Value::Double(x) => Ok(*x != 0.0),
        Value::Str(s) => ctx.get_boolean(s),
    }
}

// ── Parser state ──────────────────────────────────────────────────────────────

/// Cursor over one expression. Each evaluation gets its own, so an `expr`
/// nested inside `[...]` cannot disturb the outer one.
struct ExprParser<'c, 'e> {
    ctx: &'c mut dyn EvalContext,
    expr: &'e str,
    src: &'e [u8],
    pos: usize,
    token: Tok,
    depth: usize,
}

impl<'c, 'e> ExprParser<'c, 'e> {
    fn new(ctx: &'c mut dyn EvalContext, expr: &'e str) -> Self {
        ExprParser {
            ctx,
            expr,
            src: expr.as_bytes(),
            pos: 0,
            token: Tok::Unknown,
            depth: 0,
        }
    }

    fn run(&mut self) -> TclResult<ExprValue> {
        let value = self.get_value(-1, false)?;
        if self.token != Tok::End {
            return Err(self.syntax_error(None));
        }
        value.ok_or_else(|| self.syntax_error(None))
    }

    fn syntax_error(&self, why: Option<&str>) -> TclError {
        let mut message = format!("syntax error in expression \"{}\"", self.expr);
        if let Some(why) = why {
            message.push_str(": ");
            message.push_str(why);
        }
        TclError::syntax(ParseErrorKind::Syntax, self.pos, message)
    }

    // ── Precedence climbing ───────────────────────────────────────────────────

    /// Parse an operand followed by any `(operator, operand)` pairs whose
    /// operator binds tighter than `prec`. Returns `None` if the operand
    /// position holds a `)`, which the caller must deal with.
    fn get_value(&mut self, prec: i32, skip: bool) -> TclResult<Option<ExprValue>> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(TclError::NestingLimit);
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.climb(prec, skip));
        self.depth -= 1;
        result
    }

    fn climb(&mut self, prec: i32, skip: bool) -> TclResult<Option<ExprValue>> {
        let mut got_op = false;
        let first = self.lex(skip)?;
        let value = match self.token {
            Tok::OpenParen => {
                let inner = self.get_value(-1, skip)?;
                if self.token != Tok::CloseParen {
                    return Err(self.syntax_error(Some("looking for close parenthesis")));
                }
                inner
            }
            Tok::Op(op @ (Op::Minus | Op::Plus | Op::Not | Op::BitNot)) => {
                let op = match op {
                    Op::Minus => Op::UnaryMinus,
                    Op::Plus => Op::UnaryPlus,
                    other => other,
                };
                let mut operand = self.get_value(op.precedence(), skip)?;
                if let Some(v) = operand.as_mut() {
                    if !skip {
                        unary(op, v)?;
                    }
                }
                got_op = true;
                operand
            }
            Tok::CloseParen => return Ok(None),
            Tok::Value => first,
            Tok::Op(op) => {
                let why = format!("unexpected operator {}", op.symbol());
                return Err(self.syntax_error(Some(&why)));
            }
            Tok::Unknown => {
                return Err(self.syntax_error(Some("character not legal in expressions")))
            }
            Tok::Comma | Tok::End => {
                return Err(self.syntax_error(Some("premature end of expression")))
            }
        };
        let mut value = value.ok_or_else(|| self.syntax_error(None))?;

        if !got_op {
            self.lex(skip)?;
        }

        loop {
            let op = match self.token {
                Tok::Op(op) if !op.is_unary() => op,
                Tok::End | Tok::CloseParen | Tok::Comma => return Ok(Some(value)),
                _ => return Err(self.syntax_error(Some("extra tokens at end of expression"))),
            };
            if op.precedence() <= prec {
                return Ok(Some(value));
            }

            let rhs = if matches!(op, Op::And | Op::Or | Op::Questy) {
                let truth = match value.value() {
                    Value::Int(n) => *n != 0,
                    Value::Double(x) => *x != 0.0,
                    Value::Str(s) => match self.ctx.get_boolean(s) {
                        Ok(b) => b,
                        Err(e) if !skip => return Err(e),
                        Err(_) => false,
                    },
                };
                value.set(i64::from(truth));

                if (op == Op::And && !truth) || (op == Op::Or && truth) {
                    trace!(op = op.symbol(), "short-circuit");
                    self.get_value(op.precedence(), true)?;
                    continue;
                }
                if op == Op::Questy {
                    let branch_prec = Op::Questy.precedence() - 1;
                    if truth {
                        value = self.required(branch_prec, skip)?;
                        self.expect_colon()?;
                        self.get_value(branch_prec, true)?;
                    } else {
                        self.get_value(branch_prec, true)?;
                        self.expect_colon()?;
                        value = self.required(branch_prec, skip)?;
                    }
                    continue;
                }
                self.get_value(op.precedence(), skip)?
            } else {
                self.get_value(op.precedence(), skip)?
            };
            let rhs = rhs.ok_or_else(|| self.syntax_error(None))?;

            if matches!(self.token, Tok::Value | Tok::OpenParen | Tok::Unknown) {
                return Err(self.syntax_error(None));
            }
            if skip {
                continue;
            }
            if op == Op::Colon {
                return Err(self.syntax_error(None));
            }
            self.binary(op, &mut value, rhs)?;
        }
    }

    fn required(&mut self, prec: i32, skip: bool) -> TclResult<ExprValue> {
        self.get_value(prec, skip)?
            .ok_or_else(|| self.syntax_error(None))
    }

    fn expect_colon(&self) -> TclResult<()> {
        if self.token == Tok::Op(Op::Colon) {
            Ok(())
        } else {
            Err(self.syntax_error(None))
        }
    }

    // ── Lexer ─────────────────────────────────────────────────────────────────

    fn byte(&self, i: usize) -> Option<u8> {
        self.src.get(i).copied()
    }

    fn value(&mut self, value: ExprValue) -> TclResult<Option<ExprValue>> {
        self.token = Tok::Value;
        Ok(Some(value))
    }

    fn op(&mut self, op: Op, len: usize) -> TclResult<Option<ExprValue>> {
        self.pos += len;
        self.token = Tok::Op(op);
        Ok(None)
    }

    /// Read the next token into `self.token`. Values come back as `Some`.
    fn lex(&mut self, skip: bool) -> TclResult<Option<ExprValue>> {
        while self.byte(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let Some(c) = self.byte(self.pos) else {
            self.token = Tok::End;
            return Ok(None);
        };
        let c2 = self.byte(self.pos + 1).unwrap_or(0);

        if c != b'+' && c != b'-' {
            if let Some(value) = self.number(c)? {
                return self.value(value);
            }
        }

        let start = self.pos;
        match c {
            b'$' => {
                if skip {
                    let (_, next) = parse_var_name(self.expr, start)?;
                    self.pos = next;
                    return self.value(ExprValue::int(0));
                }
                let (s, len) = subst::parse_var(&mut *self.ctx, self.expr, start)?;
                self.pos += len;
                self.value(ExprValue::parse_string(&s))
            }
            b'[' => {
                if skip {
                    self.pos = skip_bracketed(self.expr, start + 1)?;
                    return self.value(ExprValue::int(0));
                }
                let (s, next) = subst::eval_nested(&mut *self.ctx, self.expr, start + 1)?;
                self.pos = next;
                self.value(ExprValue::parse_string(&s))
            }
            b'"' | b'{' => {
                let (tokens, next) = if c == b'"' {
                    parse_quoted_string(self.expr, start)?
                } else {
                    parse_braces(self.expr, start)?
                };
                self.pos = next;
                if skip {
                    return self.value(ExprValue::int(0));
                }
                let s = subst::eval_tokens(&mut *self.ctx, self.expr, &tokens)?;
                self.value(ExprValue::parse_string(&s))
            }
            b'(' => self.punct(Tok::OpenParen),
            b')' => self.punct(Tok::CloseParen),
            b',' => self.punct(Tok::Comma),
            b'*' => self.op(Op::Mult, 1),
            b'/' => self.op(Op::Divide, 1),
            b'%' => self.op(Op::Mod, 1),
            b'+' => self.op(Op::Plus, 1),
            b'-' => self.op(Op::Minus, 1),
            b'?' => self.op(Op::Questy, 1),
            b':' => self.op(Op::Colon, 1),
            b'^' => self.op(Op::BitXor, 1),
            b'~' => self.op(Op::BitNot, 1),
            b'<' => match c2 {
                b'<' => self.op(Op::LeftShift, 2),
                b'=' => self.op(Op::Leq, 2),
                _ => self.op(Op::Less, 1),
            },
            b'>' => match c2 {
                b'>' => self.op(Op::RightShift, 2),
                b'=' => self.op(Op::Geq, 2),
                _ => self.op(Op::Greater, 1),
            },
            b'=' if c2 == b'=' => self.op(Op::Equal, 2),
            b'!' if c2 == b'=' => self.op(Op::Neq, 2),
            b'!' => self.op(Op::Not, 1),
            b'&' if c2 == b'&' => self.op(Op::And, 2),
            b'&' => self.op(Op::BitAnd, 1),
            b'|' if c2 == b'|' => self.op(Op::Or, 2),
            b'|' => self.op(Op::BitOr, 1),
            _ => {
                if let Some(op) = self.word_operator() {
                    return self.op(op, 2);
                }
                if self.expr[start..].starts_with(char::is_alphabetic) {
                    return self.identifier(skip);
                }
                self.pos += self.expr[start..].chars().next().map_or(1, char::len_utf8);
                self.token = Tok::Unknown;
                Ok(None)
            }
        }
    }

    fn punct(&mut self, tok: Tok) -> TclResult<Option<ExprValue>> {
        self.pos += 1;
        self.token = tok;
        Ok(None)
    }

    /// Integer or double literal at the cursor, if one starts here.
    fn number(&mut self, c: u8) -> TclResult<Option<ExprValue>> {
        let start = self.pos;
        let rest = &self.src[start..];
        if rest.len() == 1 && c.is_ascii_digit() {
            self.pos += 1;
            let value = ExprValue::int(i64::from(c - b'0')).with_rep(&self.expr[start..]);
            return Ok(Some(value));
        }
        if c.is_ascii_digit() && looks_like_int(rest, false) {
            match scan_int(rest) {
                Ok((n, len)) => {
                    self.pos += len;
                    let rep = &self.expr[start..self.pos];
                    return Ok(Some(ExprValue::int(n).with_rep(rep)));
                }
                Err(ScanError::IntOverflow) => {
                    return Err(TclError::Arith(ArithCode::IntOverflow))
                }
                Err(_) => {}
            }
        } else if c.is_ascii_digit() || matches!(c, b'.' | b'n' | b'N') {
            match scan_double(rest) {
                Ok((x, len)) => {
                    self.pos += len;
                    let rep = &self.expr[start..self.pos];
                    return Ok(Some(ExprValue::double(x).with_rep(rep)));
                }
                Err(ScanError::FloatOverflow) => {
                    return Err(TclError::Arith(ArithCode::FloatOverflow))
                }
                Err(ScanError::FloatUnderflow) => {
                    return Err(TclError::Arith(ArithCode::FloatUnderflow))
                }
                Err(_) => {}
            }
        }
        Ok(None)
    }

    /// `eq`, `ne`, `in` or `ni`, unless the word here is a function call
    /// such as `int(...)`.
    fn word_operator(&self) -> Option<Op> {
        let op = match (self.byte(self.pos)?, self.byte(self.pos + 1)?) {
            (b'e', b'q') => Op::StrEq,
            (b'n', b'e') => Op::StrNeq,
            (b'i', b'n') => Op::In,
            (b'n', b'i') => Op::Ni,
            _ => return None,
        };
        let call = self.paren_follows(self.ident_end(self.pos)).is_some();
        (!call).then_some(op)
    }

    fn ident_end(&self, start: usize) -> usize {
        self.expr[start..]
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map_or(self.expr.len(), |(i, _)| start + i)
    }

    fn paren_follows(&self, mut i: usize) -> Option<usize> {
        while self.byte(i).is_some_and(|b| b.is_ascii_whitespace()) {
            i += 1;
        }
        (self.byte(i) == Some(b'(')).then_some(i)
    }

    /// A bare word: a boolean literal or a math function call.
    fn identifier(&mut self, skip: bool) -> TclResult<Option<ExprValue>> {
        let start = self.pos;
        let end = self.ident_end(start);
        let word = &self.expr[start..end];
        if self.paren_follows(end).is_none() && boolean_token(word) == Some(word) {
            self.pos = end;
            return self.value(ExprValue::string(word));
        }
        let value = self.math_function(start, end, skip)?;
        self.value(value)
    }

    fn math_function(&mut self, start: usize, end: usize, skip: bool) -> TclResult<ExprValue> {
        let name = self.expr[start..end].to_owned();
        self.pos = end;
        let known = self.ctx.math().kinds(&name).map(<[_]>::len);
        let Some(paren) = self.paren_follows(end) else {
            let why = if known.is_none() {
                "variable references require preceding $"
            } else {
                "expected parenthesis enclosing function arguments"
            };
            return Err(self.syntax_error(Some(why)));
        };
        let arity = known.ok_or_else(|| TclError::UnknownFunction(name.clone()))?;
        self.pos = paren + 1;
        trace!(function = %name, arity, "math function call");

        let mut args = Vec::with_capacity(arity);
        if arity == 0 {
            self.lex(skip)?;
            if self.token != Tok::CloseParen {
                return Err(self.syntax_error(Some(
                    "missing close parenthesis at end of function call",
                )));
            }
        } else {
            loop {
                let Some(arg) = self.get_value(-1, skip)? else {
                    return Err(too_few_args());
                };
                args.push(arg.into_value());
                if args.len() == arity {
                    match self.token {
                        Tok::CloseParen => break,
                        Tok::Comma => {
                            return Err(TclError::Arity(
                                "too many arguments for math function".into(),
                            ))
                        }
                        _ => {
                            return Err(self.syntax_error(Some(
                                "missing close parenthesis at end of function call",
                            )))
                        }
                    }
                }
                match self.token {
                    Tok::Comma => {}
                    Tok::CloseParen => return Err(too_few_args()),
                    _ => return Err(self.syntax_error(None)),
                }
            }
        }

        if skip {
            return Ok(ExprValue::int(0));
        }
        self.ctx.math().call(&name, args).map(ExprValue::from)
    }

    // ── Binary operators ──────────────────────────────────────────────────────

    /// Apply `op`, leaving the result in `value`.
    fn binary(&mut self, op: Op, value: &mut ExprValue, rhs: ExprValue) -> TclResult<()> {
        let result: Value = match op {
            Op::Mult | Op::Divide | Op::Plus | Op::Minus => {
                for side in [&*value, &rhs] {
                    if side.is_string() {
                        if value.string_rep().is_empty() || rhs.string_rep().is_empty() {
                            return Err(empty_operand(op));
                        }
                        return Err(illegal_type(side.value(), op));
                    }
                }
                match (value.value(), rhs.value()) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(int_arith(op, *a, *b)?),
                    (a, b) => {
                        let a = a.as_double().unwrap_or_default();
                        let b = b.as_double().unwrap_or_default();
                        Value::Double(double_arith(op, a, b)?)
                    }
                }
            }

            Op::Mod | Op::LeftShift | Op::RightShift | Op::BitAnd | Op::BitXor | Op::BitOr => {
                let (a, b) = match (value.value(), rhs.value()) {
                    (Value::Int(a), Value::Int(b)) => (*a, *b),
                    (Value::Int(_), _) => return Err(operand_error(&rhs, op)),
                    _ => return Err(operand_error(value, op)),
                };
                Value::Int(int_bits(op, a, b)?)
            }

            Op::Less | Op::Greater | Op::Leq | Op::Geq | Op::Equal | Op::Neq => {
                let ord = match (value.value(), rhs.value()) {
                    (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                    (Value::Str(_), _) | (_, Value::Str(_)) => {
                        Some(value.string_rep().cmp(&rhs.string_rep()))
                    }
                    (a, b) => a.as_double().partial_cmp(&b.as_double()),
                };
                Value::from(compare(op, ord))
            }

            Op::StrEq => Value::from(value.string_rep() == rhs.string_rep()),
            Op::StrNeq => Value::from(value.string_rep() != rhs.string_rep()),

            Op::In | Op::Ni => {
                let elements = self.ctx.split_list(&rhs.string_rep())?;
                let needle = value.string_rep();
                let found = elements.iter().any(|e| *e == needle);
                Value::from(found == (op == Op::In))
            }

            Op::And | Op::Or => {
                let left = match value.value() {
                    Value::Int(n) => *n != 0,
                    other => return Err(illegal_type(other, op)),
                };
                let right = match rhs.value() {
                    Value::Int(n) => *n != 0,
                    Value::Double(x) => *x != 0.0,
                    Value::Str(s) => self.ctx.get_boolean(s)?,
                };
                Value::from(if op == Op::And { left && right } else { left || right })
            }

            Op::Questy | Op::Colon | Op::UnaryMinus | Op::UnaryPlus | Op::Not | Op::BitNot => {
                return Err(TclError::runtime("unknown operator in expression"))
            }
        };
        value.set(result);
        Ok(())
    }
}

// ── Operator semantics ────────────────────────────────────────────────────────

fn int_arith(op: Op, a: i64, b: i64) -> TclResult<i64> {
    let overflow = || TclError::Arith(ArithCode::IntOverflow);
    match op {
        Op::Mult => a.checked_mul(b).ok_or_else(overflow),
        Op::Plus => a.checked_add(b).ok_or_else(overflow),
        Op::Minus => a.checked_sub(b).ok_or_else(overflow),
        _ => {
            if b == 0 {
                return Err(TclError::Arith(ArithCode::DivZero));
            }
            if a == i64::MIN && b == -1 {
                return Err(overflow());
            }
            // Round toward negative infinity.
            let q = a / b;
            Ok(if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
        }
    }
}

fn double_arith(op: Op, a: f64, b: f64) -> TclResult<f64> {
    let r = match op {
        Op::Mult => a * b,
        Op::Plus => a + b,
        Op::Minus => a - b,
        _ => {
            if b == 0.0 {
                return Err(TclError::Arith(ArithCode::DivZero));
            }
            a / b
        }
    };
    if r.is_nan() && !a.is_nan() && !b.is_nan() {
        Err(TclError::Arith(ArithCode::Domain))
    } else if r.is_infinite() && a.is_finite() && b.is_finite() {
        Err(TclError::Arith(ArithCode::FloatOverflow))
    } else if r == 0.0
        && matches!(op, Op::Mult | Op::Divide)
        && a != 0.0
        && b.is_finite()
        && b != 0.0
    {
        Err(TclError::Arith(ArithCode::FloatUnderflow))
    } else {
        Ok(r)
    }
}

fn int_bits(op: Op, a: i64, b: i64) -> TclResult<i64> {
    Ok(match op {
        Op::Mod => {
            if b == 0 {
                return Err(TclError::Arith(ArithCode::DivZero));
            }
            if b == -1 {
                return Ok(0);
            }
            // The remainder takes the sign of the divisor.
            let r = a % b;
            if r != 0 && (r < 0) != (b < 0) {
                r + b
            } else {
                r
            }
        }
        Op::LeftShift | Op::RightShift if b < 0 => {
            return Err(TclError::runtime("negative shift argument"))
        }
        Op::LeftShift if b >= 64 => 0,
        Op::LeftShift => a << b,
        Op::RightShift if b >= 64 => {
            if a < 0 {
                -1
            } else {
                0
            }
        }
        Op::RightShift => a >> b,
        Op::BitAnd => a & b,
        Op::BitXor => a ^ b,
        _ => a | b,
    })
}

fn compare(op: Op, ord: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match (op, ord) {
        // NaN compares unequal to everything.
        (Op::Neq, None) => true,
        (_, None) => false,
        (Op::Less, Some(o)) => o == Less,
        (Op::Greater, Some(o)) => o == Greater,
        (Op::Leq, Some(o)) => o != Greater,
        (Op::Geq, Some(o)) => o != Less,
        (Op::Equal, Some(o)) => o == Equal,
        (_, Some(o)) => o != Equal,
    }
}

fn unary(op: Op, value: &mut ExprValue) -> TclResult<()> {
    let result: Value = match (op, value.value()) {
        (Op::UnaryMinus, Value::Int(n)) => Value::Int(
            n.checked_neg()
                .ok_or(TclError::Arith(ArithCode::IntOverflow))?,
        ),
        (Op::UnaryMinus, Value::Double(x)) => Value::Double(-x),
        (Op::UnaryPlus, v @ (Value::Int(_) | Value::Double(_))) => v.clone(),
        (Op::Not, Value::Int(n)) => Value::from(*n == 0),
        (Op::Not, Value::Double(x)) => Value::from(*x == 0.0),
        (Op::Not, Value::Str(s)) => {
            if s.is_empty() {
                return Err(empty_operand(op));
            }
            match boolean_token(s) {
                Some(tok) if tok == s => {
                    let truthy = ["true", "on", "yes"].iter().any(|w| w.starts_with(tok));
                    Value::from(!truthy)
                }
                _ => return Err(illegal_type(value.value(), op)),
            }
        }
        (Op::BitNot, Value::Int(n)) => Value::Int(!n),
        (_, v) => return Err(operand_error_value(v, op)),
    };
    value.set(result);
    Ok(())
}

fn too_few_args() -> TclError {
    TclError::Arity("too few arguments for math function".into())
}

fn empty_operand(op: Op) -> TclError {
    TclError::Type(format!(
        "can't use empty string as operand of \"{}\"",
        op.symbol()
    ))
}

fn illegal_type(v: &Value, op: Op) -> TclError {
    TclError::Type(format!(
        "can't use {} as operand of \"{}\"",
        v.type_name(),
        op.symbol()
    ))
}

fn operand_error(v: &ExprValue, op: Op) -> TclError {
    if v.string_rep().is_empty() {
        empty_operand(op)
    } else {
        illegal_type(v.value(), op)
    }
}

fn operand_error_value(v: &Value, op: Op) -> TclError {
    match v {
        Value::Str(s) if s.is_empty() => empty_operand(op),
        _ => illegal_type(v, op),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, String>,
        math: MathRegistry,
        calls: Vec<Vec<String>>,
        error_code: Option<String>,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx {
                vars: HashMap::new(),
                math: MathRegistry::with_seed(Some(7)),
                calls: Vec::new(),
                error_code: None,
            }
        }
        fn with(mut self, k: &str, v: &str) -> Self {
            self.vars.insert(k.into(), v.into());
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&mut self, name: &str, index: Option<&str>) -> TclResult<String> {
            let key = match index {
                Some(i) => format!("{name}({i})"),
                None => name.to_owned(),
            };
            self.vars
                .get(&key)
                .cloned()
                .ok_or_else(|| TclError::runtime(format!("can't read \"{key}\": no such variable")))
        }
        fn invoke(&mut self, words: Vec<String>) -> TclResult<String> {
            self.calls.push(words.clone());
            match words.first().map(String::as_str) {
                Some("error") => Err(TclError::runtime(words[1..].join(" "))),
                Some("echo") => Ok(words[1..].join(" ")),
                Some("expr") => eval_expr_string(self, &words[1..].join(" ")),
                _ => Err(TclError::runtime("invalid command name")),
            }
        }
        fn math(&mut self) -> &mut MathRegistry {
            &mut self.math
        }
        fn set_error_code(&mut self, code: &str) {
            self.error_code = Some(code.to_owned());
        }
    }

    fn eval(src: &str) -> String {
        eval_expr_string(&mut TestCtx::new(), src).expect("eval failed")
    }

    fn eval_err(src: &str) -> TclError {
        eval_expr(&mut TestCtx::new(), src).expect_err("eval succeeded")
    }

    fn err_msg(src: &str) -> String {
        eval_err(src).to_string()
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), "42");
        assert_eq!(eval("0x1F"), "0x1F");
        assert_eq!(eval("3.25"), "3.25");
        assert_eq!(eval("\"hello\""), "hello");
        assert_eq!(eval("{a b}"), "a b");
        assert_eq!(eval("7"), "7");
    }

    #[test]
    fn precedence() {
        assert_eq!(eval("3 + 4 * 2"), "11");
        assert_eq!(eval("(3 + 4) * 2"), "14");
        assert_eq!(eval("2 - 3 - 4"), "-5");
        assert_eq!(eval("1 + 2 == 3"), "1");
        assert_eq!(eval("1 | 2 ^ 3 & 4"), "3");
        assert_eq!(eval("-2 * -3"), "6");
        assert_eq!(eval("!0 + 1"), "2");
    }

    #[test]
    fn floor_division_and_modulo() {
        assert_eq!(eval("7 / 2"), "3");
        assert_eq!(eval("7 / -2"), "-4");
        assert_eq!(eval("-7 / 2"), "-4");
        assert_eq!(eval("7 % -2"), "-1");
        assert_eq!(eval("-7 % 2"), "1");
        assert_eq!(eval("-7 % -2"), "-1");
        assert_eq!(eval("7.0 / 2"), "3.5");
    }

    #[test]
    fn shifts() {
        assert_eq!(eval("1 << 4"), "16");
        assert_eq!(eval("-16 >> 2"), "-4");
        assert_eq!(eval("1 << 64"), "0");
        assert_eq!(eval("-5 >> 70"), "-1");
        assert_eq!(eval("5 >> 70"), "0");
        assert_eq!(err_msg("1 << -1"), "negative shift argument");
    }

    #[test]
    fn mixed_type_comparison() {
        assert_eq!(eval("\"1\" == 1"), "1");
        assert_eq!(eval("1 == 1.0"), "1");
        assert_eq!(eval("1 eq \"1\""), "1");
        assert_eq!(eval("1.0 eq \"1\""), "0");
        assert_eq!(eval("0x10 == 16"), "1");
        assert_eq!(eval("0x10 eq 16"), "0");
        assert_eq!(eval("\"abc\" < \"abd\""), "1");
        assert_eq!(eval("\"10\" < \"9\""), "0");
        assert_eq!(eval("\"a\" ne \"b\""), "1");
        assert_eq!(eval("1eq1"), "1");
    }

    #[test]
    fn list_membership() {
        assert_eq!(eval("\"b\" in {a b c}"), "1");
        assert_eq!(eval("\"d\" in {a b c}"), "0");
        assert_eq!(eval("\"d\" ni {a b c}"), "1");
    }

    #[test]
    fn short_circuit_skips_side_effects() {
        let mut ctx = TestCtx::new();
        assert_eq!(eval_expr_string(&mut ctx, "0 && [error boom]").unwrap(), "0");
        assert_eq!(eval_expr_string(&mut ctx, "1 || [error boom]").unwrap(), "1");
        assert_eq!(eval_expr_string(&mut ctx, "0 && $missing").unwrap(), "0");
        assert_eq!(eval_expr_string(&mut ctx, "1 ? 2 : [error boom]").unwrap(), "2");
        assert_eq!(eval_expr_string(&mut ctx, "0 ? [error boom] : 3").unwrap(), "3");
        assert!(ctx.calls.is_empty());
    }

    #[test]
    fn skipped_operands_are_still_parsed() {
        assert!(matches!(eval_err("0 && (1"), TclError::Syntax { .. }));
        assert!(matches!(eval_err("0 && [foo"), TclError::Syntax { .. }));
    }

    #[test]
    fn logical_operators() {
        assert_eq!(eval("1 && 1"), "1");
        assert_eq!(eval("5 && 2.0"), "1");
        assert_eq!(eval("0 || 0"), "0");
        assert_eq!(eval("true && yes"), "1");
        assert_eq!(eval("1 && \"off\""), "0");
        assert_eq!(eval("!true"), "0");
        assert_eq!(eval("!f"), "1");
        assert_eq!(
            err_msg("\"x\" && 1"),
            "expected boolean value but got \"x\""
        );
    }

    #[test]
    fn ternary_is_right_associative() {
        assert_eq!(eval("1 ? 2 : 1 ? 3 : 4"), "2");
        assert_eq!(eval("0 ? 2 : 1 ? 3 : 4"), "3");
        assert_eq!(eval("0 ? 2 : 0 ? 3 : 4"), "4");
        assert_eq!(eval("1 ? 0 ? 5 : 6 : 7"), "6");
    }

    #[test]
    fn integer_overflow_is_reported() {
        let mut ctx = TestCtx::new();
        let err = eval_expr(&mut ctx, "9223372036854775807 + 1").unwrap_err();
        assert_eq!(err, TclError::Arith(ArithCode::IntOverflow));
        assert_eq!(
            ctx.error_code.as_deref(),
            Some("ARITH IOVERFLOW {integer value too large to represent}")
        );
        assert_eq!(
            eval_err("-9223372036854775807 - 2"),
            TclError::Arith(ArithCode::IntOverflow)
        );
        assert_eq!(
            eval_err("99999999999999999999"),
            TclError::Arith(ArithCode::IntOverflow)
        );
        assert_eq!(
            eval_err("(-9223372036854775807 - 1) / -1"),
            TclError::Arith(ArithCode::IntOverflow)
        );
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(eval_err("1 / 0"), TclError::Arith(ArithCode::DivZero));
        assert_eq!(eval_err("1 % 0"), TclError::Arith(ArithCode::DivZero));
        assert_eq!(eval_err("1.0 / 0"), TclError::Arith(ArithCode::DivZero));
        assert_eq!(eval_err("1e308 * 10"), TclError::Arith(ArithCode::FloatOverflow));
        assert_eq!(eval_err("1e999"), TclError::Arith(ArithCode::FloatOverflow));
        assert_eq!(eval_err("1e-200 * 1e-200"), TclError::Arith(ArithCode::FloatUnderflow));
        assert_eq!(eval_err("1e-300 / 1e300"), TclError::Arith(ArithCode::FloatUnderflow));
        assert_eq!(eval("0.0 * 1e-300"), "0.0");
    }

    #[test]
    fn type_errors() {
        assert_eq!(
            err_msg("\"a\" + 1"),
            "can't use non-numeric string as operand of \"+\""
        );
        assert_eq!(
            err_msg("{} * 2"),
            "can't use empty string as operand of \"*\""
        );
        assert_eq!(
            err_msg("1.5 % 2"),
            "can't use floating-point value as operand of \"%\""
        );
        assert_eq!(
            err_msg("~1.0"),
            "can't use floating-point value as operand of \"~\""
        );
        assert_eq!(
            err_msg("-\"x\""),
            "can't use non-numeric string as operand of \"-\""
        );
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(
            err_msg("(1 + 2"),
            "syntax error in expression \"(1 + 2\": looking for close parenthesis"
        );
        assert_eq!(
            err_msg("1 +"),
            "syntax error in expression \"1 +\": premature end of expression"
        );
        assert_eq!(
            err_msg("* 2"),
            "syntax error in expression \"* 2\": unexpected operator *"
        );
        assert_eq!(
            err_msg("1 @ 2"),
            "syntax error in expression \"1 @ 2\": extra tokens at end of expression"
        );
        assert_eq!(
            err_msg("@"),
            "syntax error in expression \"@\": character not legal in expressions"
        );
        assert_eq!(
            err_msg("1 2"),
            "syntax error in expression \"1 2\": extra tokens at end of expression"
        );
        assert_eq!(
            err_msg("x + 1"),
            "syntax error in expression \"x + 1\": variable references require preceding $"
        );
        assert_eq!(err_msg("1 : 2"), "syntax error in expression \"1 : 2\"");
        assert_eq!(err_msg("1 ? 2"), "syntax error in expression \"1 ? 2\"");
        assert_eq!(
            err_msg(""),
            "syntax error in expression \"\": premature end of expression"
        );
    }

    #[test]
    fn math_functions() {
        assert_eq!(eval("sqrt(16)"), "4.0");
        assert_eq!(eval("int(3.7) + 1"), "4");
        assert_eq!(eval("round(-2.5)"), "-3");
        assert_eq!(eval("pow(2, 10)"), "1024.0");
        assert_eq!(eval("abs(-3)"), "3");
        assert_eq!(eval("double(1)"), "1.0");
        assert_eq!(eval("abs (-1)"), "1");
    }

    #[test]
    fn math_function_errors() {
        assert_eq!(
            err_msg("sin"),
            "syntax error in expression \"sin\": expected parenthesis enclosing function arguments"
        );
        assert_eq!(err_msg("nosuch(1)"), "unknown math function \"nosuch\"");
        assert_eq!(err_msg("pow(1)"), "too few arguments for math function");
        assert_eq!(err_msg("pow(1,)"), "too few arguments for math function");
        assert_eq!(err_msg("sin(1, 2)"), "too many arguments for math function");
        assert_eq!(
            err_msg("rand(1)"),
            "syntax error in expression \"rand(1)\": missing close parenthesis at end of function call"
        );
        assert_eq!(
            err_msg("sin(\"x\")"),
            "argument to math function didn't have numeric value"
        );
        assert_eq!(eval_err("acos(2)"), TclError::Arith(ArithCode::Domain));
    }

    #[test]
    fn boolean_words_need_a_word_boundary() {
        assert_eq!(eval("true"), "true");
        assert_eq!(eval("!tru"), "0");
        assert_eq!(eval("int(1.5)"), "1");
        assert_eq!(
            err_msg("truex"),
            "syntax error in expression \"truex\": variable references require preceding $"
        );
    }

    #[test]
    fn variables_and_commands() {
        let mut ctx = TestCtx::new().with("x", "7").with("a(k)", "2.5").with("s", "0x10");
        assert_eq!(eval_expr_string(&mut ctx, "$x + 1").unwrap(), "8");
        assert_eq!(eval_expr_string(&mut ctx, "$a(k) * 2").unwrap(), "5.0");
        assert_eq!(eval_expr_string(&mut ctx, "$s").unwrap(), "0x10");
        assert_eq!(eval_expr_string(&mut ctx, "[echo 3] * 2").unwrap(), "6");
        assert_eq!(eval_expr_string(&mut ctx, "\"$x$x\" + 0").unwrap(), "77");
        assert_eq!(eval_expr_string(&mut ctx, "{$x}").unwrap(), "$x");
    }

    #[test]
    fn nested_expr_does_not_disturb_outer_cursor() {
        let mut ctx = TestCtx::new();
        assert_eq!(eval_expr_string(&mut ctx, "[expr 1+2] + 3").unwrap(), "6");
        assert_eq!(
            eval_expr_string(&mut ctx, "[expr {[expr 2] * 3}] - 1").unwrap(),
            "5"
        );
    }

    #[test]
    fn octal_literals_versus_doubles() {
        assert_eq!(eval("010 + 0"), "8");
        assert_eq!(eval("010.5 + 0"), "10.5");
        assert_eq!(eval("010e0 + 0"), "10.0");
    }

    #[test]
    fn boolean_result() {
        let mut ctx = TestCtx::new();
        assert!(eval_expr_boolean(&mut ctx, "2 > 1").unwrap());
        assert!(!eval_expr_boolean(&mut ctx, "0.0").unwrap());
        assert!(eval_expr_boolean(&mut ctx, "{yes}").unwrap());
        assert!(eval_expr_boolean(&mut ctx, "{maybe}").is_err());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let deep = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        assert_eq!(eval_err(&deep), TclError::NestingLimit);
        let ok = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval(&ok), "1");
    }

    #[test]
    fn operator_table() {
        assert_eq!(Op::Mult.precedence(), 12);
        assert_eq!(Op::Colon.precedence(), 1);
        assert_eq!(Op::Not.precedence(), 13);
        assert_eq!(Op::StrNeq.symbol(), "ne");
    }
}
