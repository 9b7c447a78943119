//! Command-line interface for script-session.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Scripts to execute, in order.
    pub scripts: Vec<PathBuf>,
    /// Arguments after `--`, handed to every script.
    pub script_args: Vec<String>,
    /// Emit debug artifacts next to each script.
    pub debug: bool,
    /// Session key shared by all scripts.
    pub session: Option<String>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut args: Vec<OsString> = args.into_iter().collect();
    // Everything after the first `--` belongs to the scripts.
    let script_args = match args.iter().skip(1).position(|a| a == "--") {
        Some(index) => {
            let tail = args.split_off(index + 1);
            tail.into_iter()
                .skip(1)
                .map(|a| {
                    a.into_string()
                        .map_err(|a| ArgsError::InvalidValue("script argument", a.to_string_lossy().into()))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    let mut result = Args {
        script_args,
        ..Args::default()
    };
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('d') | Long("debug") => {
                result.debug = true;
            }
            Short('s') | Long("session") => {
                let value: String = parser.value()?.parse()?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue("session", value));
                }
                result.session = Some(value);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.scripts.push(PathBuf::from(val));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"script-session {version}
Incremental script runner with resumable sessions

USAGE:
    script-session [OPTIONS] [SCRIPT...] [-- ARGS...]

Scripts run in order and always share one session, so later scripts see
the variables of earlier ones. The session key is --session, or a generated
one when no key is configured. Without scripts an interactive prompt reads
submissions from stdin.

OPTIONS:
    -d, --debug             Write debug artifacts to <script dir>/bin
    -s, --session <KEY>     Session key to run under
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

PROMPT COMMANDS:
    :vars                   List the variables of the current session
    :quit                   Exit

ENVIRONMENT VARIABLES:
    SCRIPT_SESSION_KEY        Session key (overrides config)
    SCRIPT_SESSION_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Run one script
    script-session hello.csx

    # Run two scripts in one session and pass them arguments
    script-session -s work setup.csx main.csx -- input.txt 42

    # Emit debug artifacts
    script-session --debug main.csx
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("script-session {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("script-session")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.scripts.is_empty());
        assert!(result.script_args.is_empty());
        assert!(!result.debug);
        assert!(result.session.is_none());
    }

    #[test]
    fn test_scripts_in_order() {
        let result = parse_args_from(args(&["a.csx", "b.csx"])).unwrap();
        assert_eq!(
            result.scripts,
            vec![PathBuf::from("a.csx"), PathBuf::from("b.csx")]
        );
    }

    #[test]
    fn test_script_args_after_separator() {
        let result = parse_args_from(args(&["main.csx", "--", "-x", "--debug", "3"])).unwrap();
        assert_eq!(result.scripts, vec![PathBuf::from("main.csx")]);
        assert_eq!(result.script_args, vec!["-x", "--debug", "3"]);
        assert!(!result.debug);
    }

    #[test]
    fn test_separator_without_args() {
        let result = parse_args_from(args(&["main.csx", "--"])).unwrap();
        assert!(result.script_args.is_empty());
    }

    #[test]
    fn test_session_and_debug() {
        let result = parse_args_from(args(&["-d", "-s", "work"])).unwrap();
        assert!(result.debug);
        assert_eq!(result.session, Some("work".to_string()));

        let result = parse_args_from(args(&["--debug", "--session=work"])).unwrap();
        assert!(result.debug);
        assert_eq!(result.session, Some("work".to_string()));
    }

    #[test]
    fn test_empty_session_rejected() {
        assert!(parse_args_from(args(&["-s", " "])).is_err());
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/config.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/config.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_unknown_option() {
        assert!(parse_args_from(args(&["--verbose"])).is_err());
    }

    #[test]
    fn test_missing_value() {
        assert!(parse_args_from(args(&["--session"])).is_err());
    }
}
