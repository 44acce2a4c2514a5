//! Script interpreter.
//!
//! The [`Interpreter`] owns the variable table, the math-function registry
//! and the error state (`errorInfo` / `errorCode`).  It implements
//! [`EvalContext`] so the tokenizer and the expression evaluator can call
//! back into it for variable reads and command invocation.
//!
//! The command set is deliberately small: enough to drive the tokenizer and
//! `expr` end to end from scripts.
//!
//! ```rust
//! use tcl::script::Interpreter;
//!
//! let mut interp = Interpreter::new();
//! interp.eval("set x 6\nputs [expr {$x * 7}]").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! ```

use std::collections::HashMap;

use tracing::debug;

use super::expr::{eval_expr, eval_expr_boolean, eval_expr_string, EvalContext};
use super::list::{merge_list, split_list};
use super::mathfunc::MathRegistry;
use super::number::get_int;
use super::parser::commands_complete;
use super::subst::{eval_script, subst};
use super::value::ExprValue;
use crate::config::Config;
use crate::error::{ArithCode, TclError, TclResult};

/// Default ceiling on nested command invocations.
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// Longest command text quoted in an `errorInfo` frame.
const MAX_TRACE_COMMAND: usize = 150;

// ── Variables ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Var {
    Scalar(String),
    Array(HashMap<String, String>),
}

/// Split `a(k)` into `("a", Some("k"))`; anything else is a scalar name.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.find('(') {
        Some(open) if open > 0 && name.ends_with(')') => {
            (&name[..open], Some(&name[open + 1..name.len() - 1]))
        }
        _ => (name, None),
    }
}

fn display_name(name: &str, index: Option<&str>) -> String {
    match index {
        Some(i) => format!("{name}({i})"),
        None => name.to_owned(),
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// Script interpreter state.
pub struct Interpreter {
    /// Global variables; there are no procedure frames.
    vars: HashMap<String, Var>,
    math: MathRegistry,
    /// Lines written to `stdout` by `puts`.
    pub output: Vec<String>,
    /// True after `puts -nonewline` until the line is finished.
    line_open: bool,
    /// Current command nesting depth.
    depth: usize,
    recursion_limit: usize,
    error_info: String,
    error_code: String,
    /// Set once the first frame of an error trace is written.
    error_in_progress: bool,
    /// Code to publish with the error currently unwinding.
    pending_code: Option<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            vars: HashMap::new(),
            math: MathRegistry::new(),
            output: Vec::new(),
            line_open: false,
            depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            error_info: String::new(),
            error_code: "NONE".to_owned(),
            error_in_progress: false,
            pending_code: None,
        }
    }

    /// Interpreter using the limits and seed from a loaded [`Config`].
    pub fn with_config(config: &Config) -> Self {
        Interpreter {
            math: MathRegistry::with_seed(config.rand_seed),
            recursion_limit: config.recursion_limit,
            ..Self::new()
        }
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate a script and return the result of its last command.
    pub fn eval(&mut self, script: &str) -> TclResult<String> {
        self.begin();
        let result = eval_script(self, script);
        self.finish(&result);
        result
    }

    /// Evaluate an expression directly, as the `expr` command would.
    pub fn expr(&mut self, expr: &str) -> TclResult<ExprValue> {
        self.begin();
        let result = eval_expr(self, expr);
        self.finish(&result);
        result
    }

    fn begin(&mut self) {
        if self.depth == 0 {
            self.error_in_progress = false;
            self.pending_code = None;
        }
    }

    fn finish<T>(&mut self, result: &TclResult<T>) {
        if let Err(err) = result {
            if self.depth == 0 {
                self.settle_error(err);
            }
        }
    }

    /// Make `errorInfo`/`errorCode` describe `err` if no command frame did.
    fn settle_error(&mut self, err: &TclError) {
        if !self.error_in_progress {
            self.error_info = err.to_string();
            self.error_code = self
                .pending_code
                .take()
                .unwrap_or_else(|| err.error_code());
        }
        self.error_in_progress = false;
        self.pending_code = None;
    }

    /// The stack trace of the most recent error.
    pub fn error_info(&self) -> &str {
        &self.error_info
    }

    /// The machine-readable code of the most recent error (`NONE` if none).
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    pub fn math_mut(&mut self) -> &mut MathRegistry {
        &mut self.math
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    /// Drain `stdout` output as text ready to print.
    pub fn take_output(&mut self) -> String {
        let mut text = self.output.join("\n");
        if !self.output.is_empty() && !self.line_open {
            text.push('\n');
        }
        self.output.clear();
        self.line_open = false;
        text
    }

    // ── Variable access ───────────────────────────────────────────────────────

    /// Value of `name` (`a(k)` reads an array element), if set.
    pub fn var(&self, name: &str) -> Option<String> {
        let (name, index) = split_name(name);
        self.read_var(name, index).ok()
    }

    /// Set a scalar or array element; returns the new value.
    pub fn set_var(&mut self, name: &str, value: impl Into<String>) -> TclResult<String> {
        let (name, index) = split_name(name);
        self.write_var(name, index, value.into())
    }

    pub fn unset_var(&mut self, name: &str) -> TclResult<()> {
        let (name, index) = split_name(name);
        self.remove_var(name, index)
    }

    fn read_var(&self, name: &str, index: Option<&str>) -> TclResult<String> {
        let reason = match (self.vars.get(name), index) {
            (Some(Var::Scalar(s)), None) => return Ok(s.clone()),
            (Some(Var::Array(elems)), Some(i)) => match elems.get(i) {
                Some(s) => return Ok(s.clone()),
                None => "no such element in array",
            },
            (Some(Var::Scalar(_)), Some(_)) => "variable isn't array",
            (Some(Var::Array(_)), None) => "variable is array",
            (None, _) => "no such variable",
        };
        Err(TclError::runtime(format!(
            "can't read \"{}\": {reason}",
            display_name(name, index)
        )))
    }

    fn write_var(&mut self, name: &str, index: Option<&str>, value: String) -> TclResult<String> {
        let slot = self
            .vars
            .entry(name.to_owned())
            .or_insert_with(|| match index {
                Some(_) => Var::Array(HashMap::new()),
                None => Var::Scalar(String::new()),
            });
        match (slot, index) {
            (Var::Scalar(s), None) => *s = value.clone(),
            (Var::Array(elems), Some(i)) => {
                elems.insert(i.to_owned(), value.clone());
            }
            (Var::Scalar(_), Some(_)) => {
                return Err(TclError::runtime(format!(
                    "can't set \"{}\": variable isn't array",
                    display_name(name, index)
                )))
            }
            (Var::Array(_), None) => {
                return Err(TclError::runtime(format!(
                    "can't set \"{name}\": variable is array"
                )))
            }
        }
        Ok(value)
    }

    fn remove_var(&mut self, name: &str, index: Option<&str>) -> TclResult<()> {
        if index.is_none() && self.vars.remove(name).is_some() {
            return Ok(());
        }
        let reason = match (self.vars.get_mut(name), index) {
            (Some(Var::Array(elems)), Some(i)) => match elems.remove(i) {
                Some(_) => return Ok(()),
                None => "no such element in array",
            },
            (Some(Var::Scalar(_)), Some(_)) => "variable isn't array",
            _ => "no such variable",
        };
        Err(TclError::runtime(format!(
            "can't unset \"{}\": {reason}",
            display_name(name, index)
        )))
    }

    // ── Output ────────────────────────────────────────────────────────────────

    fn write_stdout(&mut self, text: &str, newline: bool) {
        match self.output.last_mut() {
            Some(last) if self.line_open => last.push_str(text),
            _ => self.output.push(text.to_owned()),
        }
        self.line_open = !newline;
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn dispatch(&mut self, words: &[String]) -> TclResult<String> {
        match words[0].as_str() {
            "set" => self.cmd_set(words),
            "unset" => self.cmd_unset(words),
            "puts" => self.cmd_puts(words),
            "expr" => self.cmd_expr(words),
            "error" => self.cmd_error(words),
            "incr" => self.cmd_incr(words),
            "if" => self.cmd_if(words),
            "while" => self.cmd_while(words),
            "eval" => self.cmd_eval(words),
            "catch" => self.cmd_catch(words),
            "list" => Ok(merge_list(&words[1..])),
            "llength" => self.cmd_llength(words),
            "lindex" => self.cmd_lindex(words),
            "concat" => Ok(concat(&words[1..])),
            "info" => self.cmd_info(words),
            "subst" => self.cmd_subst(words),
            name => Err(TclError::runtime(format!("invalid command name \"{name}\""))),
        }
    }

    fn cmd_set(&mut self, words: &[String]) -> TclResult<String> {
        match words {
            [_, name] => {
                let (name, index) = split_name(name);
                self.read_var(name, index)
            }
            [_, name, value] => self.set_var(name, value.clone()),
            _ => Err(wrong_args("set varName ?newValue?")),
        }
    }

    fn cmd_unset(&mut self, words: &[String]) -> TclResult<String> {
        for name in &words[1..] {
            self.unset_var(name)?;
        }
        Ok(String::new())
    }

    fn cmd_puts(&mut self, words: &[String]) -> TclResult<String> {
        let (newline, rest) = match &words[1..] {
            [flag, rest @ ..] if flag == "-nonewline" && !rest.is_empty() => (false, rest),
            rest => (true, rest),
        };
        let (channel, text) = match rest {
            [text] => ("stdout", text),
            [channel, text] => (channel.as_str(), text),
            _ => return Err(wrong_args("puts ?-nonewline? ?channelId? string")),
        };
        match channel {
            "stdout" => self.write_stdout(text, newline),
            "stderr" if newline => eprintln!("{text}"),
            "stderr" => eprint!("{text}"),
            other => {
                return Err(TclError::runtime(format!(
                    "can not find channel named \"{other}\""
                )))
            }
        }
        Ok(String::new())
    }

    fn cmd_expr(&mut self, words: &[String]) -> TclResult<String> {
        if words.len() < 2 {
            return Err(wrong_args("expr arg ?arg ...?"));
        }
        let expr = if words.len() == 2 {
            words[1].clone()
        } else {
            concat(&words[1..])
        };
        eval_expr_string(self, &expr)
    }

    fn cmd_error(&mut self, words: &[String]) -> TclResult<String> {
        if !(2..=4).contains(&words.len()) {
            return Err(wrong_args("error message ?errorInfo? ?errorCode?"));
        }
        let code = words.get(3).cloned().unwrap_or_else(|| "NONE".to_owned());
        match words.get(2) {
            Some(info) if !info.is_empty() => {
                self.error_in_progress = true;
                self.error_info = info.clone();
                self.error_code = code;
            }
            _ => self.pending_code = Some(code),
        }
        Err(TclError::runtime(words[1].clone()))
    }

    fn cmd_incr(&mut self, words: &[String]) -> TclResult<String> {
        let (name, by) = match words {
            [_, name] => (name, 1),
            [_, name, by] => (name, get_int(by)?),
            _ => return Err(wrong_args("incr varName ?increment?")),
        };
        let (base, index) = split_name(name);
        let current = get_int(&self.read_var(base, index)?)?;
        let sum = current
            .checked_add(by)
            .ok_or(TclError::Arith(ArithCode::IntOverflow))?;
        self.write_var(base, index, sum.to_string())
    }

    fn cmd_if(&mut self, words: &[String]) -> TclResult<String> {
        let mut i = 1;
        loop {
            let Some(cond) = words.get(i) else {
                return Err(TclError::runtime(format!(
                    "wrong # args: no expression after \"{}\" argument",
                    words[i - 1]
                )));
            };
            let truth = eval_expr_boolean(self, cond)?;
            i += 1;
            if words.get(i).is_some_and(|w| w == "then") {
                i += 1;
            }
            let Some(body) = words.get(i) else {
                return Err(TclError::runtime(format!(
                    "wrong # args: no script following \"{}\" argument",
                    words[i - 1]
                )));
            };
            if truth {
                return eval_script(self, body);
            }
            i += 1;
            match words.get(i).map(String::as_str) {
                None => return Ok(String::new()),
                Some("elseif") => i += 1,
                Some(_) => break,
            }
        }
        if words[i] == "else" {
            i += 1;
            if i >= words.len() {
                return Err(TclError::runtime(
                    "wrong # args: no script following \"else\" argument",
                ));
            }
        }
        if i + 1 < words.len() {
            return Err(TclError::runtime(
                "wrong # args: extra words after \"else\" clause in \"if\" command",
            ));
        }
        eval_script(self, &words[i])
    }

    fn cmd_while(&mut self, words: &[String]) -> TclResult<String> {
        let [_, test, body] = words else {
            return Err(wrong_args("while test command"));
        };
        while eval_expr_boolean(self, test)? {
            eval_script(self, body)?;
        }
        Ok(String::new())
    }

    fn cmd_eval(&mut self, words: &[String]) -> TclResult<String> {
        match words {
            [_] => Err(wrong_args("eval arg ?arg ...?")),
            [_, script] => eval_script(self, script),
            _ => eval_script(self, &concat(&words[1..])),
        }
    }

    fn cmd_catch(&mut self, words: &[String]) -> TclResult<String> {
        let (script, var) = match words {
            [_, script] => (script, None),
            [_, script, var] => (script, Some(var)),
            _ => return Err(wrong_args("catch command ?varName?")),
        };
        let (code, value) = match eval_script(self, script) {
            Ok(result) => (0, result),
            Err(err) => {
                self.settle_error(&err);
                let info = self.error_info.clone();
                let error_code = self.error_code.clone();
                self.set_var("errorInfo", info)?;
                self.set_var("errorCode", error_code)?;
                (1, err.to_string())
            }
        };
        if let Some(var) = var {
            self.set_var(var, value)?;
        }
        Ok(code.to_string())
    }

    fn cmd_llength(&mut self, words: &[String]) -> TclResult<String> {
        let [_, list] = words else {
            return Err(wrong_args("llength list"));
        };
        Ok(split_list(list)?.len().to_string())
    }

    fn cmd_lindex(&mut self, words: &[String]) -> TclResult<String> {
        let [_, list, index] = words else {
            return Err(wrong_args("lindex list index"));
        };
        let mut elements = split_list(list)?;
        let at = list_index(index, elements.len())?;
        match at {
            Some(i) if i < elements.len() => Ok(elements.swap_remove(i)),
            _ => Ok(String::new()),
        }
    }

    fn cmd_info(&mut self, words: &[String]) -> TclResult<String> {
        let Some(option) = words.get(1) else {
            return Err(wrong_args("info option ?arg arg ...?"));
        };
        match option.as_str() {
            "exists" => {
                let [_, _, name] = words else {
                    return Err(wrong_args("info exists varName"));
                };
                Ok(flag(self.var(name).is_some()))
            }
            "complete" => {
                let [_, _, command] = words else {
                    return Err(wrong_args("info complete command"));
                };
                Ok(flag(commands_complete(command)))
            }
            other => Err(TclError::runtime(format!(
                "bad option \"{other}\": must be complete or exists"
            ))),
        }
    }

    fn cmd_subst(&mut self, words: &[String]) -> TclResult<String> {
        let [_, text] = words else {
            return Err(wrong_args("subst string"));
        };
        subst(self, text)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn wrong_args(usage: &str) -> TclError {
    TclError::runtime(format!("wrong # args: should be \"{usage}\""))
}

fn flag(b: bool) -> String {
    u8::from(b).to_string()
}

/// Join arguments with single spaces after trimming each, dropping empties.
fn concat(words: &[String]) -> String {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `3`, `end` or `end-2` against a list of `len` elements. `None`
/// means before the start.
fn list_index(index: &str, len: usize) -> TclResult<Option<usize>> {
    let bad = || {
        TclError::runtime(format!(
            "bad index \"{index}\": must be integer or end?-integer?"
        ))
    };
    let n = if let Some(rest) = index.strip_prefix("end") {
        let back = match rest.strip_prefix('-') {
            Some(off) => get_int(off).map_err(|_| bad())?,
            None if rest.is_empty() => 0,
            None => return Err(bad()),
        };
        (len as i64 - 1).checked_sub(back).ok_or_else(bad)?
    } else {
        get_int(index).map_err(|_| bad())?
    };
    Ok(usize::try_from(n).ok())
}

/// Quote `command` for a trace frame, cutting long commands short.
fn trace_text(command: &str) -> String {
    if command.len() <= MAX_TRACE_COMMAND {
        return command.to_owned();
    }
    let mut end = MAX_TRACE_COMMAND;
    while !command.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &command[..end])
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn get_var(&mut self, name: &str, index: Option<&str>) -> TclResult<String> {
        self.read_var(name, index)
    }

    fn invoke(&mut self, words: Vec<String>) -> TclResult<String> {
        if self.depth >= self.recursion_limit {
            return Err(TclError::NestingLimit);
        }
        debug!(command = %words[0], depth = self.depth, "dispatch");
        self.depth += 1;
        let result = self.dispatch(&words);
        self.depth -= 1;
        result
    }

    fn math(&mut self) -> &mut MathRegistry {
        &mut self.math
    }

    fn set_error_code(&mut self, code: &str) {
        self.pending_code = Some(code.to_owned());
    }

    fn record_error(&mut self, err: &TclError, command: &str) {
        let text = trace_text(command);
        if self.error_in_progress {
            self.error_info
                .push_str(&format!("\n    invoked from within\n\"{text}\""));
        } else {
            self.error_in_progress = true;
            self.error_info = format!("{err}\n    while executing\n\"{text}\"");
            self.error_code = self
                .pending_code
                .take()
                .unwrap_or_else(|| err.error_code());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
