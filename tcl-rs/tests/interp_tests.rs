//! End-to-end scripts through the interpreter: tokenizer, substitution and
//! `expr` working together.

use pretty_assertions::assert_eq;
use tcl::error::{ArithCode, ParseErrorKind, TclError};
use tcl::script::parser::{commands_complete, parse_command};
use tcl::script::token::TokenKind;
use tcl::script::mathfunc::{ArgKind, RandState};
use tcl::script::{Interpreter, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn eval(script: &str) -> String {
    Interpreter::new()
        .eval(script)
        .unwrap_or_else(|e| panic!("eval of {script:?} failed: {e}"))
}

fn expr(src: &str) -> String {
    eval(&format!("expr {{{src}}}"))
}

fn eval_err(script: &str) -> (TclError, Interpreter) {
    let mut interp = Interpreter::new();
    let err = interp.eval(script).expect_err("expected an error");
    (err, interp)
}

// ── Expression semantics ──────────────────────────────────────────────────────

#[test]
fn precedence() {
    assert_eq!(expr("3 + 4 * 2"), "11");
    assert_eq!(expr("(3 + 4) * 2"), "14");
    assert_eq!(expr("2 + 3 < 6 && 1"), "1");
    assert_eq!(expr("-2 * -3"), "6");
}

#[test]
fn floor_division_and_modulo() {
    assert_eq!(expr("7 / -2"), "-4");
    assert_eq!(expr("7 % -2"), "-1");
    assert_eq!(expr("-7 % 2"), "1");
    assert_eq!(expr("-7 / 2"), "-4");
}

#[test]
fn short_circuit_has_no_side_effects() {
    assert_eq!(expr("0 && [error boom]"), "0");
    assert_eq!(expr("1 || [error boom]"), "1");
    assert_eq!(eval("set x 0; expr {0 && [set x 1]}; set x"), "0");
    assert_eq!(expr("0 && $undefined"), "0");
    assert_eq!(expr("1 ? 5 : [error boom]"), "5");
}

#[test]
fn ternary_is_right_associative() {
    assert_eq!(expr("1 ? 2 : 1 ? 3 : 4"), "2");
    assert_eq!(expr("0 ? 2 : 0 ? 3 : 4"), "4");
}

#[test]
fn mixed_type_comparison() {
    assert_eq!(expr("\"1\" == 1"), "1");
    assert_eq!(expr("1 eq \"1\""), "1");
    assert_eq!(expr("1.0 eq \"1\""), "0");
    assert_eq!(expr("\"abc\" < \"abd\""), "1");
    assert_eq!(expr("\"b\" in {a b c}"), "1");
    assert_eq!(expr("\"b\" ni {a b c}"), "0");
}

#[test]
fn integer_overflow_is_reported() {
    let (err, interp) = eval_err("expr {9223372036854775807 + 1}");
    assert_eq!(err, TclError::Arith(ArithCode::IntOverflow));
    assert_eq!(
        interp.error_code(),
        "ARITH IOVERFLOW {integer value too large to represent}"
    );
    assert!(interp.error_info().starts_with("integer value too large to represent\n"));

    let (err, _) = eval_err("expr {(-9223372036854775807 - 1) / -1}");
    assert_eq!(err, TclError::Arith(ArithCode::IntOverflow));
}

#[test]
fn division_by_zero_code() {
    let (err, interp) = eval_err("expr {1 / 0}");
    assert_eq!(err.to_string(), "divide by zero");
    assert_eq!(interp.error_code(), "ARITH DIVZERO {divide by zero}");
}

#[test]
fn float_underflow_code() {
    for src in ["exp(-1000)", "1e-200 * 1e-200", "1e-400", "pow(10, -400)"] {
        let (err, interp) = eval_err(&format!("expr {{{src}}}"));
        assert_eq!(err, TclError::Arith(ArithCode::FloatUnderflow), "{src}");
        assert_eq!(
            interp.error_code(),
            "ARITH UNDERFLOW {floating-point value too small to represent}",
            "{src}"
        );
    }
    assert_eq!(expr("exp(-10) > 0"), "1");
}

#[test]
fn shifts_past_width() {
    assert_eq!(expr("1 << 64"), "0");
    assert_eq!(expr("-8 >> 70"), "-1");
    assert_eq!(expr("8 >> 70"), "0");
}

#[test]
fn operand_type_errors() {
    let msg = |script: &str| eval_err(script).0.to_string();
    assert_eq!(msg("expr {\"\" + 1}"), "can't use empty string as operand of \"+\"");
    assert_eq!(msg("expr {\"abc\" - 1}"), "can't use non-numeric string as operand of \"-\"");
    assert_eq!(msg("expr {1.5 % 2}"), "can't use floating-point value as operand of \"%\"");
}

#[test]
fn math_functions_end_to_end() {
    assert_eq!(expr("sqrt(16)"), "4.0");
    assert_eq!(expr("int(3.7) + round(2.5)"), "6");
    assert_eq!(expr("abs(-3)"), "3");
    assert_eq!(expr("fmod(7, 3)"), "1.0");

    let (err, interp) = eval_err("expr {sqrt(-1)}");
    assert_eq!(err, TclError::Arith(ArithCode::Domain));
    assert_eq!(
        interp.error_code(),
        "ARITH DOMAIN {domain error: argument not in valid range}"
    );
    assert_eq!(eval_err("expr {nosuch(1)}").0.to_string(), "unknown math function \"nosuch\"");
    assert_eq!(eval_err("expr {pow(2)}").0.to_string(), "too few arguments for math function");
}

#[test]
fn host_math_function() {
    fn cube(args: &[Value], _: &mut RandState) -> tcl::TclResult<Value> {
        match args {
            [Value::Int(n)] => Ok(Value::Int(n * n * n)),
            _ => Err(TclError::runtime("bad argument")),
        }
    }
    let mut interp = Interpreter::new();
    interp.math_mut().register("cube", &[ArgKind::Int], cube);
    assert_eq!(interp.eval("expr {cube(3) + 1}").unwrap(), "28");
    assert_eq!(interp.eval("expr {cube(2.9)}").unwrap(), "8");
}

#[test]
fn double_formatting() {
    assert_eq!(expr("1e20 * 1"), "1e+20");
    assert_eq!(expr("1.0 / 4"), "0.25");
    assert_eq!(expr("2.0 * 3"), "6.0");
    assert_eq!(expr("0x10"), "0x10");
}

#[test]
fn octal_integer_versus_decimal_double() {
    assert_eq!(expr("010 + 0"), "8");
    assert_eq!(expr("010.0 + 0"), "10.0");
    let (err, _) = eval_err("set n 08; incr n");
    assert_eq!(
        err.to_string(),
        "expected integer but got \"08\" (looks like invalid octal number)"
    );
}

#[test]
fn rand_is_deterministic_after_srand() {
    let script = "set out [expr {srand(42)}]; set i 0\n\
                  while {$i < 5} {set out [concat $out [expr {rand()}]]; incr i}\n\
                  set out";
    let a = eval(script);
    let b = eval(script);
    assert_eq!(a, b);
    assert_eq!(a.split(' ').count(), 6);
    assert!(a.split(' ').all(|x| x.parse::<f64>().is_ok_and(|v| v > 0.0 && v < 1.0)));
}

// ── Tokenizer through scripts ─────────────────────────────────────────────────

#[test]
fn backslash_table() {
    assert_eq!(eval("set s \"\\n\\t\\x41\\101\\u0041\""), "\n\tAAA");
    assert_eq!(eval("set s a\\ b"), "a b");
}

#[test]
fn brace_words_are_literal() {
    let src = "set w {a $b [c] \\\n   }";
    let parse = parse_command(src, 0, None, false).unwrap();
    let (_, components) = parse.words().nth(2).unwrap();
    assert!(components
        .iter()
        .all(|t| matches!(t.kind, TokenKind::Text | TokenKind::Backslash)));
    assert_eq!(eval(src), "a $b [c]  ");
}

#[test]
fn incomplete_versus_syntax_error() {
    let err = parse_command("puts {unterminated", 0, None, false).unwrap_err();
    assert!(err.is_incomplete());
    assert!(!commands_complete("puts {unterminated"));

    assert!(commands_complete("puts unterminated}"));
    let err = parse_command("puts {a}b", 0, None, false).unwrap_err();
    assert_eq!(err.parse_kind(), Some(ParseErrorKind::BraceExtra));
    assert!(!err.is_incomplete());
}

#[test]
fn simple_word_source_round_trips() {
    let src = "set foo {bar baz} \"q r\" plain";
    let parse = parse_command(src, 0, None, false).unwrap();
    for (word, _) in parse.words() {
        assert_eq!(word.kind, TokenKind::SimpleWord);
        let text = word.source(src);
        let again = parse_command(text, 0, None, false).unwrap();
        let (first, _) = again.words().next().unwrap();
        assert_eq!(first.source(text), text);
    }
}

#[test]
fn nested_command_substitution() {
    assert_eq!(eval("set a [set b [expr {1 + [expr 2]}]]"), "3");
    assert_eq!(eval("set x 4; expr {[expr {$x * 2}] + 1}"), "9");
}

// ── Error reporting ───────────────────────────────────────────────────────────

#[test]
fn error_info_accumulates_frames() {
    let (err, interp) = eval_err("set x 1\nif {$x} {\n  set y [error boom]\n}");
    assert_eq!(err.to_string(), "boom");
    let frames: Vec<&str> = interp.error_info().lines().collect();
    assert_eq!(frames[0], "boom");
    assert_eq!(frames[1], "    while executing");
    assert_eq!(frames[2], "\"error boom\"");
    assert_eq!(frames[3], "    invoked from within");
    assert_eq!(frames[4], "\"set y [error boom]\"");
    assert_eq!(frames.last().copied(), Some("}\""));
}

#[test]
fn catch_then_continue() {
    let script = "set rc [catch {expr {1 % 0}} msg]\nlist $rc $msg $errorCode";
    assert_eq!(eval(script), "1 {divide by zero} {ARITH DIVZERO {divide by zero}}");
}

#[test]
fn runaway_recursion_is_an_error() {
    let (err, _) = eval_err("set s {eval $s}; eval $s");
    assert_eq!(err, TclError::NestingLimit);
    assert_eq!(err.to_string(), "too many nested evaluations (infinite loop?)");
}

#[test]
fn deep_expression_nesting_is_an_error() {
    let src = format!("expr {{{}1{}}}", "(".repeat(5000), ")".repeat(5000));
    let (err, _) = eval_err(&src);
    assert_eq!(err, TclError::NestingLimit);
}
