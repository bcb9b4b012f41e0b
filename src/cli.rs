//! Command-line interface for shell-capture.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

/// What the binary prints once the command has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Forward output live and print nothing afterwards.
    #[default]
    Stream,
    /// Capture quietly, then print stdout.
    Text,
    /// Capture quietly, then pretty-print stdout as JSON.
    Json,
    /// Print each stdout line as a JSON string while the command runs.
    Lines,
}

impl FromStr for OutputMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(Self::Stream),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "lines" => Ok(Self::Lines),
            _ => Err(()),
        }
    }
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Shell binary override.
    pub shell: Option<String>,
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Environment overlay entries.
    pub env: Vec<(String, String)>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Suppress live forwarding.
    pub quiet: bool,
    /// Exit with the child's code instead of reporting an error.
    pub nothrow: bool,
    /// Output mode.
    pub output: OutputMode,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
    /// Command words, joined with spaces into one command line.
    pub command: Vec<String>,
}

impl Args {
    /// The command line to hand to the shell.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
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

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('s') | Long("shell") => {
                result.shell = Some(parser.value()?.parse()?);
            }
            Short('C') | Long("cwd") => {
                result.cwd = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                let (key, val) = value
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .ok_or_else(|| ArgsError::InvalidValue("env", value.clone()))?;
                result.env.push((key.to_string(), val.to_string()));
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_ms = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('q') | Long("quiet") => {
                result.quiet = true;
            }
            Long("nothrow") => {
                result.nothrow = true;
            }
            Short('o') | Long("output") => {
                let value: String = parser.value()?.parse()?;
                result.output = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("output", value))?;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                // Everything from the first command word on belongs to the command.
                result.command.push(val.string()?);
                for raw in parser.raw_args()? {
                    result.command.push(
                        raw.into_string()
                            .map_err(|raw| ArgsError::NonUnicode(raw.to_string_lossy().into()))?,
                    );
                }
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
        r#"shell-capture {version}
Run a shell command, capture its output, and report the result

USAGE:
    shell-capture [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -s, --shell <PATH>      Shell binary [default: /bin/sh, cmd.exe on Windows]
    -C, --cwd <DIR>         Working directory for the command
    -e, --env <KEY=VALUE>   Set an environment variable (repeatable)
    -t, --timeout <MS>      Kill the command after this many milliseconds
    -q, --quiet             Do not forward output while the command runs
        --nothrow           Do not report a failing command as an error
    -o, --output <MODE>     stream, text, json or lines [default: stream]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_CAPTURE_SHELL       Shell binary (overrides config)
    SHELL_CAPTURE_QUIET       Quiet flag (overrides config)
    SHELL_CAPTURE_NOTHROW     No-throw flag (overrides config)
    SHELL_CAPTURE_TIMEOUT_MS  Timeout in milliseconds (overrides config)
    SHELL_CAPTURE_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Run a command, forwarding its output
    shell-capture ls -la

    # Decode JSON output
    shell-capture -o json -- cat package.json

    # Give up after two seconds
    shell-capture -t 2000 -- ./slow-script.sh
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-capture {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Command word that is not valid UTF-8.
    NonUnicode(String),
    /// No command was given.
    MissingCommand,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NonUnicode(arg) => write!(f, "argument is not valid unicode: '{}'", arg),
            Self::MissingCommand => write!(f, "no command given"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
