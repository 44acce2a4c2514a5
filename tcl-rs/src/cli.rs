//! Command-line argument parsing.
//!
//! Usage:
//!   tcl [-d] [-f[<file>]] [-c <script>] [-e <expr>] [-n | -t] [<script-file>]

use std::path::PathBuf;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which settings file to load.
    pub config: ConfigFile,
    /// Script to evaluate (`-c <script>`).
    pub command: Option<String>,
    /// Expression to evaluate (`-e <expr>`).
    pub expr: Option<String>,
    /// What to do with the script instead of running it.
    pub mode: Mode,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Script file to run; stdin when absent.
    pub script: Option<PathBuf>,
}

/// How to choose the settings file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// `$TCLRS_CONFIG`, then `~/.tclrsrc`, then `./.tclrsrc` (default).
    #[default]
    Search,
    /// `-f` with no file argument: use built-in defaults.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

/// What to do with the script.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Evaluate it (default).
    #[default]
    Run,
    /// `-n`: report whether it is complete and parses cleanly.
    Check,
    /// `-t`: print the token list of each command.
    Tokens,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(&raw[1..])
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag argument: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'n' => set_mode(&mut args, Mode::Check)?,
                't' => set_mode(&mut args, Mode::Tokens)?,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                // -c<script> / -e<expr>
                flag @ ('c' | 'e') => {
                    let value = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else if flag == 'c' {
                        return Err("-c requires a script argument".to_owned());
                    } else {
                        return Err("-e requires an expression argument".to_owned());
                    };
                    if flag == 'c' {
                        args.command = Some(value);
                    } else {
                        args.expr = Some(value);
                    }
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        1 => args.script = Some(PathBuf::from(positional.remove(0))),
        n => return Err(format!("too many arguments ({n})")),
    }
    if args.command.is_some() && args.expr.is_some() {
        return Err("-c and -e are mutually exclusive".to_owned());
    }
    if args.expr.is_some() && args.mode != Mode::Run {
        return Err("-n and -t apply to scripts, not -e".to_owned());
    }

    Ok(args)
}

fn set_mode(args: &mut CliArgs, mode: Mode) -> Result<(), String> {
    if args.mode != Mode::Run && args.mode != mode {
        return Err("-n and -t are mutually exclusive".to_owned());
    }
    args.mode = mode;
    Ok(())
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the settings file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TCLRS_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var("HOME").unwrap_or_default();
    [format!("{home}/.tclrsrc"), "./.tclrsrc".to_owned()]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a.mode, Mode::Run);
        assert!(a.script.is_none());
        assert!(matches!(a.config, ConfigFile::Search));
    }

    #[test]
    fn script_positional() {
        let a = parse_argv(&argv(&["run.tcl"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("run.tcl")));
    }

    #[test]
    fn dash_is_positional() {
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("-")));
    }

    #[test]
    fn bool_flags() {
        let a = parse_argv(&argv(&["-d", "-n"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.mode, Mode::Check);
        let a = parse_argv(&argv(&["-dt"])).unwrap();
        assert!(a.debug);
        assert_eq!(a.mode, Mode::Tokens);
    }

    #[test]
    fn check_and_tokens_conflict() {
        assert!(parse_argv(&argv(&["-nt"])).is_err());
    }

    #[test]
    fn config_skip() {
        let a = parse_argv(&argv(&["-f"])).unwrap();
        assert!(matches!(a.config, ConfigFile::Skip));
    }

    #[test]
    fn config_explicit_embedded() {
        let a = parse_argv(&argv(&["-fmy.rc"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.rc")));
    }

    #[test]
    fn config_explicit_separate() {
        let a = parse_argv(&argv(&["-f", "my.rc", "go.tcl"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.rc")));
        assert_eq!(a.script, Some(PathBuf::from("go.tcl")));
    }

    #[test]
    fn command_forms() {
        let a = parse_argv(&argv(&["-cputs hi"])).unwrap();
        assert_eq!(a.command.as_deref(), Some("puts hi"));
        let a = parse_argv(&argv(&["-c", "set x 1"])).unwrap();
        assert_eq!(a.command.as_deref(), Some("set x 1"));
        assert!(parse_argv(&argv(&["-c"])).is_err());
    }

    #[test]
    fn expr_forms() {
        let a = parse_argv(&argv(&["-e", "1 + 2"])).unwrap();
        assert_eq!(a.expr.as_deref(), Some("1 + 2"));
        assert!(parse_argv(&argv(&["-e", "1", "-c", "x"])).is_err());
        assert!(parse_argv(&argv(&["-n", "-e", "1"])).is_err());
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-weird.tcl"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("-weird.tcl")));
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
