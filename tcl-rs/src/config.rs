//! `.tclrsrc` settings file parser.
//!
//! The file is written in Tcl syntax and read with the same tokenizer that
//! runs scripts, but only literal words are accepted:
//!
//! | Setting | Value | Default |
//! |---------|-------|---------|
//! | `set recursion_limit <n>` | positive integer | `1000` |
//! | `set rand_seed <n>` | integer seed for `rand()` | clock |
//! | `set log_filter <directives>` | `tracing` filter, e.g. `tcl=debug` | `warn` |
//! | `set echo_results <bool>` | print each REPL result | `true` |
//! | `# ...` | comment, ignored | |
//!
//! Braces, quotes and backslash escapes work as usual; `$var` and `[cmd]`
//! substitutions are rejected.  The environment variable
//! `TCLRS_RECURSION_LIMIT` overrides `recursion_limit` after loading.

use std::path::Path;

use tracing::debug;

use crate::error::TclError;
use crate::script::backslash;
use crate::script::interp::DEFAULT_RECURSION_LIMIT;
use crate::script::number::{get_boolean, get_int};
use crate::script::parser::parse_command;
use crate::script::token::{CommandParse, TokenKind};

/// Environment override for [`Config::recursion_limit`].
pub const RECURSION_LIMIT_ENV: &str = "TCLRS_RECURSION_LIMIT";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading settings.  `line` is 0 for
/// errors that come from the environment rather than the file.
#[derive(Debug)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(f, "line {}: {}", self.line, self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

/// Interpreter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub recursion_limit: usize,
    pub rand_seed: Option<i64>,
    pub log_filter: Option<String>,
    pub echo_results: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            rand_seed: None,
            log_filter: None,
            echo_results: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings string.
    ///
    /// Bad commands are reported and skipped; a syntax error stops the
    /// load since the rest of the file can't be tokenized reliably.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();
        let mut start = 0;

        while start < s.len() {
            let parse = match parse_command(s, start, None, false) {
                Ok(parse) => parse,
                Err(err) => {
                    let offset = match &err {
                        TclError::Syntax { offset, .. } => *offset,
                        _ => start,
                    };
                    errors.push(ConfigError {
                        line: line_of(s, offset),
                        message: err.to_string(),
                    });
                    break;
                }
            };
            let next = parse.next_start();
            if parse.num_words > 0 {
                let line = line_of(s, parse.command_start);
                let applied = literal_words(s, &parse).and_then(|words| config.apply(&words));
                if let Err(message) = applied {
                    errors.push(ConfigError { line, message });
                }
            }
            if next <= start {
                break;
            }
            start = next;
        }

        (config, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading settings");
        Ok(Self::load_str(&s))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Vec<ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (exposed for testing).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if let Some(value) = lookup(RECURSION_LIMIT_ENV) {
            match parse_limit(&value) {
                Ok(limit) => self.recursion_limit = limit,
                Err(message) => errors.push(ConfigError {
                    line: 0,
                    message: format!("{RECURSION_LIMIT_ENV}: {message}"),
                }),
            }
        }
        errors
    }

    fn apply(&mut self, words: &[String]) -> Result<(), String> {
        let (name, value) = match words {
            [cmd, name, value] if cmd == "set" => (name, value),
            [cmd, ..] if cmd == "set" => {
                return Err("wrong # args: should be \"set name value\"".to_owned())
            }
            [cmd, ..] => {
                return Err(format!(
                    "unsupported command \"{cmd}\" (only \"set\" is allowed)"
                ))
            }
            [] => return Ok(()),
        };
        debug!(name = %name, value = %value, "setting");
        match name.as_str() {
            "recursion_limit" => self.recursion_limit = parse_limit(value)?,
            "rand_seed" => self.rand_seed = Some(get_int(value).map_err(|e| e.to_string())?),
            "log_filter" => self.log_filter = Some(value.clone()),
            "echo_results" => {
                self.echo_results = get_boolean(value).map_err(|e| e.to_string())?
            }
            other => return Err(format!("unknown setting \"{other}\"")),
        }
        Ok(())
    }
}

// ── Word helpers ──────────────────────────────────────────────────────────────

/// 1-based line number of byte `offset`.
fn line_of(s: &str, offset: usize) -> usize {
    s.as_bytes()[..offset.min(s.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// The words of `parse`, with backslashes decoded and nothing substituted.
fn literal_words(s: &str, parse: &CommandParse) -> Result<Vec<String>, String> {
    parse
        .words()
        .map(|(_, components)| {
            let mut word = String::new();
            for tok in components {
                match tok.kind {
                    TokenKind::Text => word.push_str(tok.source(s)),
                    TokenKind::Backslash => word.push(backslash::decode(s.as_bytes(), tok.start).ch),
                    _ => {
                        return Err(
                            "substitutions are not allowed in the settings file".to_owned()
                        )
                    }
                }
            }
            Ok(word)
        })
        .collect()
}

fn parse_limit(value: &str) -> Result<usize, String> {
    let n = get_int(value).map_err(|e| e.to_string())?;
    match usize::try_from(n) {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(format!("recursion_limit must be positive, got {n}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
