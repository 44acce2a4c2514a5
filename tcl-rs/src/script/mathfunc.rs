//! Math functions callable from expressions, e.g. `sqrt(2)` or `rand()`.
//!
//! Each registry owns its own random-number state, so two interpreters
//! seeded with the same `srand(n)` produce the same `rand()` sequence.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ArithCode, TclError, TclResult};

use super::value::Value;

/// Argument kind a math function requires. Arguments are converted to the
/// required kind before the function runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Int,
    Double,
    Either,
}

/// Signature for host-registered math functions.
pub type MathFn = fn(&[Value], &mut RandState) -> TclResult<Value>;

#[derive(Debug, Clone, Copy)]
enum MathImpl {
    Builtin,
    Host(MathFn),
}

#[derive(Debug, Clone)]
struct MathFunc {
    kinds: Vec<ArgKind>,
    apply: MathImpl,
}

use ArgKind::{Double as D, Either as E, Int as I};

const BUILTINS: &[(&str, &[ArgKind])] = &[
    ("abs", &[E]),
    ("acos", &[D]),
    ("asin", &[D]),
    ("atan", &[D]),
    ("atan2", &[D, D]),
    ("ceil", &[D]),
    ("cos", &[D]),
    ("cosh", &[D]),
    ("double", &[E]),
    ("exp", &[D]),
    ("floor", &[D]),
    ("fmod", &[D, D]),
    ("hypot", &[D, D]),
    ("int", &[E]),
    ("log", &[D]),
    ("log10", &[D]),
    ("pow", &[D, D]),
    ("rand", &[]),
    ("round", &[E]),
    ("sin", &[D]),
    ("sinh", &[D]),
    ("sqrt", &[D]),
    ("srand", &[I]),
    ("tan", &[D]),
    ("tanh", &[D]),
    ("wide", &[E]),
];

// ── Random numbers ────────────────────────────────────────────────────────────

const IA: i64 = 16807;
const IM: i64 = 2_147_483_647;
const IQ: i64 = 127_773;
const IR: i64 = 2836;

/// Park-Miller minimal standard generator behind `rand()` and `srand()`.
#[derive(Debug, Clone, Default)]
pub struct RandState {
    seed: Option<i64>,
}

impl RandState {
    pub fn new(seed: Option<i64>) -> Self {
        RandState {
            seed: seed.map(normalize_seed),
        }
    }

    pub fn reseed(&mut self, seed: i64) {
        self.seed = Some(normalize_seed(seed));
    }

    /// Next value in `[0, 1)`. Seeds from the clock on first use.
    pub fn next_double(&mut self) -> f64 {
        let mut seed = match self.seed {
            Some(s) => s,
            None => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                normalize_seed(millis)
            }
        };
        let tmp = seed / IQ;
        seed = IA * (seed - tmp * IQ) - IR * tmp;
        if seed < 0 {
            seed += IM;
        }
        self.seed = Some(seed);
        seed as f64 * (1.0 / IM as f64)
    }
}

/// Keep the low 31 bits; zero (and IM itself) would lock the generator at 0.
fn normalize_seed(seed: i64) -> i64 {
    match (seed & 0x7fff_ffff) % IM {
        0 => 123_459_876,
        s => s,
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Name → math function table plus per-registry random state.
#[derive(Debug, Clone)]
pub struct MathRegistry {
    funcs: HashMap<String, MathFunc>,
    rand: RandState,
}

impl Default for MathRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MathRegistry {
    pub fn new() -> Self {
        Self::with_seed(None)
    }

    /// Registry whose generator starts from `seed` instead of the clock.
    pub fn with_seed(seed: Option<i64>) -> Self {
        let funcs = BUILTINS
            .iter()
            .map(|(name, kinds)| {
                let func = MathFunc {
                    kinds: kinds.to_vec(),
                    apply: MathImpl::Builtin,
                };
                ((*name).to_owned(), func)
            })
            .collect();
        MathRegistry {
            funcs,
            rand: RandState::new(seed),
        }
    }

    /// Argument kinds of `name`, if registered.
    pub fn kinds(&self, name: &str) -> Option<&[ArgKind]> {
        self.funcs.get(name).map(|f| f.kinds.as_slice())
    }

    /// Add or replace a math function.
    pub fn register(&mut self, name: &str, kinds: &[ArgKind], f: MathFn) {
        let func = MathFunc {
            kinds: kinds.to_vec(),
            apply: MathImpl::Host(f),
        };
        self.funcs.insert(name.to_owned(), func);
    }

    /// Check arity and argument kinds, convert, and run `name`.
    pub fn call(&mut self, name: &str, mut args: Vec<Value>) -> TclResult<Value> {
        let func = self
            .funcs
            .get(name)
            .ok_or_else(|| TclError::UnknownFunction(name.to_owned()))?;
        if args.len() < func.kinds.len() {
            return Err(TclError::Arity(
                "too few arguments for math function".into(),
            ));
        }
        if args.len() > func.kinds.len() {
            return Err(TclError::Arity(
                "too many arguments for math function".into(),
            ));
        }
        for (arg, kind) in args.iter_mut().zip(&func.kinds) {
            *arg = match (std::mem::take(arg), kind) {
                (Value::Str(_), _) => {
                    return Err(TclError::Type(
                        "argument to math function didn't have numeric value".into(),
                    ))
                }
                (Value::Int(n), ArgKind::Double) => Value::Double(n as f64),
                (Value::Double(x), ArgKind::Int) => Value::Int(x as i64),
                (v, _) => v,
            };
        }
        match func.apply {
            MathImpl::Builtin => call_builtin(name, &args, &mut self.rand)
                .unwrap_or_else(|| Err(TclError::UnknownFunction(name.to_owned()))),
            MathImpl::Host(f) => f(&args, &mut self.rand),
        }
    }
}

// ── Built-in implementations ──────────────────────────────────────────────────

/// Run a built-in math function on already-converted arguments.
///
/// Returns `None` if `name` is not a built-in.
fn call_builtin(name: &str, args: &[Value], rand: &mut RandState) -> Option<TclResult<Value>> {
    fn inner(name: &str, args: &[Value], rand: &mut RandState) -> TclResult<Option<Value>> {
        Ok(Some(match name {
            // ── Unary double ─────────────────────────────────────────────────
            "acos" | "asin" => {
                let x = get_double(args, 0)?;
                if !(-1.0..=1.0).contains(&x) {
                    return Err(domain());
                }
                checked(if name == "acos" { x.acos() } else { x.asin() })?
            }
            "log" | "log10" | "sqrt" => {
                let x = get_double(args, 0)?;
                if x < 0.0 {
                    return Err(domain());
                }
                checked(match name {
                    "log" => x.ln(),
                    "log10" => x.log10(),
                    _ => x.sqrt(),
                })?
            }
            "atan" => checked(get_double(args, 0)?.atan())?,
            "ceil" => checked(get_double(args, 0)?.ceil())?,
            "cos" => checked(get_double(args, 0)?.cos())?,
            "cosh" => checked(get_double(args, 0)?.cosh())?,
            "exp" => {
                let x = get_double(args, 0)?;
                underflow_checked(x.exp(), x.is_finite())?
            }
            "floor" => checked(get_double(args, 0)?.floor())?,
            "sin" => checked(get_double(args, 0)?.sin())?,
            "sinh" => checked(get_double(args, 0)?.sinh())?,
            "tan" => checked(get_double(args, 0)?.tan())?,
            "tanh" => checked(get_double(args, 0)?.tanh())?,

            // ── Binary double ────────────────────────────────────────────────
            "atan2" => {
                let y = get_double(args, 0)?;
                let x = get_double(args, 1)?;
                if y == 0.0 && x == 0.0 {
                    return Err(domain());
                }
                checked(y.atan2(x))?
            }
            "pow" => {
                let b = get_double(args, 0)?;
                let e = get_double(args, 1)?;
                if (b < 0.0 && e.fract() != 0.0) || (b == 0.0 && e < 0.0) {
                    return Err(domain());
                }
                underflow_checked(b.powf(e), b != 0.0 && e.is_finite())?
            }
            "fmod" => {
                let x = get_double(args, 0)?;
                let y = get_double(args, 1)?;
                if y == 0.0 {
                    return Err(domain());
                }
                checked(x % y)?
            }
            "hypot" => {
                let x = get_double(args, 0)?;
                let y = get_double(args, 1)?;
                underflow_checked(x.hypot(y), x != 0.0 || y != 0.0)?
            }

            // ── Either kind ──────────────────────────────────────────────────
            "abs" => match first(args)? {
                Value::Int(n) => Value::Int(
                    n.checked_abs()
                        .ok_or(TclError::Arith(ArithCode::IntOverflow))?,
                ),
                Value::Double(x) => Value::Double(x.abs()),
                Value::Str(_) => return Err(not_numeric()),
            },
            "double" => match first(args)? {
                Value::Int(n) => Value::Double(*n as f64),
                Value::Double(x) => Value::Double(*x),
                Value::Str(_) => return Err(not_numeric()),
            },
            "int" | "wide" => match first(args)? {
                Value::Int(n) => Value::Int(*n),
                Value::Double(x) => Value::Int(to_int(x.trunc())?),
                Value::Str(_) => return Err(not_numeric()),
            },
            "round" => match first(args)? {
                Value::Int(n) => Value::Int(*n),
                // f64::round rounds half away from zero.
                Value::Double(x) => Value::Int(to_int(x.round())?),
                Value::Str(_) => return Err(not_numeric()),
            },

            // ── Random ───────────────────────────────────────────────────────
            "rand" => Value::Double(rand.next_double()),
            "srand" => {
                let seed = first(args)?
                    .as_int()
                    .ok_or_else(not_numeric)?;
                rand.reseed(seed);
                Value::Double(rand.next_double())
            }

            _ => return Ok(None),
        }))
    }
    inner(name, args, rand).transpose()
}

fn domain() -> TclError {
    TclError::Arith(ArithCode::Domain)
}

fn not_numeric() -> TclError {
    TclError::Type("argument to math function didn't have numeric value".into())
}

fn first(args: &[Value]) -> TclResult<&Value> {
    args.first()
        .ok_or_else(|| TclError::Arity("too few arguments for math function".into()))
}

fn get_double(args: &[Value], idx: usize) -> TclResult<f64> {
    args.get(idx)
        .ok_or_else(|| TclError::Arity("too few arguments for math function".into()))?
        .as_double()
        .ok_or_else(not_numeric)
}

/// Reject NaN and infinite results.
fn checked(x: f64) -> TclResult<Value> {
    if x.is_nan() {
        Err(domain())
    } else if x.is_infinite() {
        Err(TclError::Arith(ArithCode::FloatOverflow))
    } else {
        Ok(Value::Double(x))
    }
}

/// Like [`checked`], but a zero result is an underflow when the inputs
/// could not produce an exact zero.
fn underflow_checked(x: f64, nonzero_inputs: bool) -> TclResult<Value> {
    if x == 0.0 && nonzero_inputs {
        Err(TclError::Arith(ArithCode::FloatUnderflow))
    } else {
        checked(x)
    }
}

/// Convert an integral double to `i64`, failing outside the 64-bit range.
fn to_int(x: f64) -> TclResult<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if x.is_nan() {
        Err(domain())
    } else if x >= LIMIT || x < -LIMIT {
        Err(TclError::Arith(ArithCode::IntOverflow))
    } else {
        Ok(x as i64)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
