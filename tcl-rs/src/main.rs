use std::io::{self, BufRead, Read, Write};
use std::path::Path;

use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tcl::cli::{self, ConfigFile, Mode};
use tcl::config::Config;
use tcl::script::parser::{commands_complete, parse_script};
use tcl::script::Interpreter;
use tcl::TclError;

const USAGE: &str = "Usage: tcl [-d] [-f[<file>]] [-c <script>] [-e <expr>] [-n | -t] [<script-file>]";

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tcl: {e}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    // ── Settings and logging ──────────────────────────────────────────────────
    let (config, warnings) = load_config(&args.config);
    init_tracing(args.debug, config.log_filter.as_deref());
    for w in &warnings {
        eprintln!("tcl: warning: {w}");
    }
    debug!(?config, "settings loaded");

    let mut interp = Interpreter::with_config(&config);

    // ── Dispatch on what to run ───────────────────────────────────────────────
    let status = if let Some(expr) = args.expr {
        run_expr(&mut interp, &expr)
    } else if let Some(script) = args.command {
        run_source(&mut interp, &script, args.mode, true)
    } else if let Some(path) = args.script {
        match read_source(&path) {
            Ok(src) => run_source(&mut interp, &src, args.mode, false),
            Err(e) => {
                eprintln!("tcl: {}: {e}", path.display());
                1
            }
        }
    } else if args.mode != Mode::Run {
        match read_source(Path::new("-")) {
            Ok(src) => run_source(&mut interp, &src, args.mode, false),
            Err(e) => {
                eprintln!("tcl: stdin: {e}");
                1
            }
        }
    } else {
        repl(&mut interp, config.echo_results)
    };

    std::process::exit(status);
}

/// Locate and read the settings file, then apply environment overrides.
/// Problems are returned as warnings; defaults fill in for anything bad.
fn load_config(which: &ConfigFile) -> (Config, Vec<String>) {
    let path = match which {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => cli::find_user_config(),
    };
    let mut warnings = Vec::new();
    let mut config = match path {
        None => Config::default(),
        Some(path) => match Config::load_file(&path) {
            Ok((config, errors)) => {
                warnings.extend(errors.iter().map(|e| format!("{}: {e}", path.display())));
                config
            }
            Err(e) => {
                warnings.push(format!("{}: {e}", path.display()));
                Config::default()
            }
        },
    };
    warnings.extend(config.apply_env().iter().map(ToString::to_string));
    (config, warnings)
}

/// `RUST_LOG` wins, then the settings file, then `warn`; `-d` forces debug.
fn init_tracing(debug: bool, configured: Option<&str>) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured.unwrap_or("warn")))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .with(filter)
        .init();
}

fn read_source(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src)?;
        Ok(src)
    } else {
        std::fs::read_to_string(path)
    }
}

// ── Modes ─────────────────────────────────────────────────────────────────────

fn run_expr(interp: &mut Interpreter, expr: &str) -> i32 {
    match interp.expr(expr) {
        Ok(value) => {
            println!("{value}");
            0
        }
        Err(err) => {
            report(&err, interp.error_code());
            1
        }
    }
}

fn run_source(interp: &mut Interpreter, src: &str, mode: Mode, echo: bool) -> i32 {
    match mode {
        Mode::Run => {
            let result = interp.eval(src);
            flush(interp);
            match result {
                Ok(value) => {
                    if echo && !value.is_empty() {
                        println!("{value}");
                    }
                    0
                }
                Err(err) => {
                    report(&err, interp.error_code());
                    debug!(error_info = %interp.error_info(), "script failed");
                    1
                }
            }
        }
        Mode::Check => {
            if !commands_complete(src) {
                println!("incomplete");
                return 1;
            }
            match parse_script(src) {
                Ok(_) => {
                    println!("complete");
                    0
                }
                Err(err) => {
                    report(&err, &err.error_code());
                    1
                }
            }
        }
        Mode::Tokens => match parse_script(src) {
            Ok(commands) => {
                for (n, parse) in commands.iter().enumerate() {
                    println!("# command {}: {}", n + 1, parse.command_text(src).trim_end());
                    print!("{}", parse.dump(src));
                }
                0
            }
            Err(err) => {
                report(&err, &err.error_code());
                1
            }
        },
    }
}

/// Read-eval-print loop. Lines accumulate until they form complete commands.
fn repl(interp: &mut Interpreter, echo_results: bool) -> i32 {
    let tty = unsafe { libc::isatty(libc::STDIN_FILENO) != 0 };
    let echo = echo_results && tty;
    let mut buffer = String::new();
    let mut failed = false;

    prompt(tty, "% ");
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("tcl: stdin: {e}");
                return 1;
            }
        };
        buffer.push_str(&line);
        buffer.push('\n');
        if !commands_complete(&buffer) {
            prompt(tty, "> ");
            continue;
        }

        let script = std::mem::take(&mut buffer);
        let result = interp.eval(&script);
        flush(interp);
        match result {
            Ok(value) if echo && !value.is_empty() => println!("{value}"),
            Ok(_) => {}
            Err(err) => {
                report(&err, interp.error_code());
                failed = true;
            }
        }
        prompt(tty, "% ");
    }

    if !buffer.trim().is_empty() {
        eprintln!("tcl: incomplete command at end of input");
        failed = true;
    }
    if tty {
        println!();
    }
    i32::from(failed && !tty)
}

// ── Output helpers ────────────────────────────────────────────────────────────

fn prompt(tty: bool, text: &str) {
    if tty {
        print!("{text}");
        let _ = io::stdout().flush();
    }
}

fn flush(interp: &mut Interpreter) {
    print!("{}", interp.take_output());
    let _ = io::stdout().flush();
}

fn report(err: &TclError, code: &str) {
    eprintln!("error: {err}");
    if code != "NONE" {
        eprintln!("errorCode: {code}");
    }
}
