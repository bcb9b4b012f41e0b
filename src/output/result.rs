//! Frozen outcome of an invocation.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::blob::Blob;
use super::relaxed;

/// Exit code reported when the process produced none (spawn failure,
/// disconnect, or termination by signal).
pub const ABORTED_EXIT_CODE: i32 = -1;

/// Captured result of a finished command.
///
/// Cloning is cheap: both buffers are shared. All accessors are read-only
/// and may be called any number of times.
#[derive(Debug, Clone)]
pub struct Output {
    stdout: Arc<[u8]>,
    stderr: Arc<[u8]>,
    exit_code: i32,
    signal: Option<i32>,
    duration: Duration,
    quiet: bool,
}

impl Output {
    /// Create a new frozen outcome.
    pub fn new(
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: i32,
        signal: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            signal,
            duration,
            quiet: false,
        }
    }

    /// Mark the outcome as quiet, silencing decode diagnostics.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Effective exit code; [`ABORTED_EXIT_CODE`] when none was reported.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Signal that terminated the process, if any.
    pub fn signal(&self) -> Option<i32> {
        self.signal
    }

    /// Wall time from spawn to settlement.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Raw stdout bytes.
    pub fn stdout_bytes(&self) -> &[u8] {
        &self.stdout
    }

    /// Raw stderr bytes.
    pub fn stderr_bytes(&self) -> &[u8] {
        &self.stderr
    }

    /// Stdout decoded as UTF-8 (lossy).
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded as UTF-8 (lossy).
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Alias for [`Output::stdout`].
    pub fn text(&self) -> String {
        self.stdout()
    }

    /// Stdout parsed as a permissive JSON document.
    ///
    /// Comments and trailing commas are tolerated. Malformed input yields
    /// `None`; unless the command was quiet, the reason is written to stderr.
    pub fn json(&self) -> Option<Value> {
        self.decode(relaxed::parse)
    }

    /// Stdout deserialized into `T` via the permissive parser.
    pub fn json_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.decode(relaxed::parse_as)
    }

    fn decode<T>(&self, parse: impl FnOnce(&str) -> serde_json::Result<T>) -> Option<T> {
        match parse(&self.stdout()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("stdout is not valid JSON: {}", e);
                if !self.quiet {
                    let _ = writeln!(std::io::stderr(), "shell-capture: invalid JSON output: {e}");
                }
                None
            }
        }
    }

    /// Shared handle to the stdout bytes.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.stdout)
    }

    /// Blob-like wrapper around stdout.
    pub fn blob(&self) -> Blob {
        Blob::new(Arc::clone(&self.stdout))
    }

    /// Stdout split on newlines.
    ///
    /// A single trailing empty segment is dropped when stdout ends in a
    /// newline. A `\r` before the newline is kept as part of the line.
    pub fn lines(&self) -> Vec<String> {
        let text = self.stdout();
        let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), 0, None, Duration::ZERO)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stdout(text: &str) -> Output {
        Output::new(text.as_bytes().to_vec(), Vec::new(), 0, None, Duration::ZERO).with_quiet(true)
    }

    #[test]
    fn test_success_follows_exit_code() {
        assert!(Output::default().success());
        let failed = Output::new(Vec::new(), Vec::new(), 3, None, Duration::ZERO);
        assert!(!failed.success());
        assert_eq!(failed.exit_code(), 3);
    }

    #[test]
    fn test_text_and_display() {
        let out = stdout("hello\n");
        assert_eq!(out.text(), "hello\n");
        assert_eq!(out.to_string(), "hello\n");
        assert_eq!(out.stdout_bytes(), b"hello\n");
    }

    #[test]
    fn test_lines_drop_single_trailing_empty() {
        assert_eq!(stdout("a\nb\n").lines(), vec!["a", "b"]);
        assert_eq!(stdout("a\nb").lines(), vec!["a", "b"]);
        assert_eq!(stdout("a\n\n").lines(), vec!["a", ""]);
        assert!(stdout("").lines().is_empty());
    }

    #[test]
    fn test_json_permissive() {
        let out = stdout("{\"a\": 1, // note\n \"b\": [1, 2,],}\n");
        let value = out.json().unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(value["b"][1], 2);
    }

    #[test]
    fn test_json_failure_is_absent() {
        assert!(stdout("not json").json().is_none());
    }

    #[test]
    fn test_json_as_typed() {
        #[derive(serde::Deserialize)]
        struct Pkg {
            name: String,
        }
        let pkg: Pkg = stdout("{\"name\": \"demo\"}").json_as().unwrap();
        assert_eq!(pkg.name, "demo");
    }

    #[test]
    fn test_clone_shares_buffers() {
        let out = stdout("shared");
        let copy = out.clone();
        assert!(Arc::ptr_eq(&out.bytes(), &copy.bytes()));
    }
}
