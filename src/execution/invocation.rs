//! Lazily started shell command.

use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tracing::warn;

use super::command::CommandConfig;
use super::lines::LineStream;
use super::runner::{ChunkTap, ProcessRunner, Started};
use crate::config::Defaults;
use crate::error::{CommandError, ShellCaptureError};
use crate::output::{Blob, Output, ABORTED_EXIT_CODE};
use crate::Result;

/// Create a pending command with built-in defaults.
///
/// Nothing runs until the command is awaited or a terminal accessor such as
/// [`ShellCommand::text`] or [`ShellCommand::stdin`] is called.
pub fn shell(command_line: impl Into<String>) -> ShellCommand {
    ShellCommand::new(command_line)
}

/// A shell command that starts on first use.
///
/// Setters consume and return the command, so they chain. Every terminal
/// accessor shares one memoized start: the process is spawned at most once
/// and all accessors observe the same outcome.
///
/// Both `ShellCommand` and `&ShellCommand` can be awaited directly.
///
/// The child's stdin stays open until [`ShellCommand::stdin`] hands it out
/// and the caller drops it, so a command that reads stdin (`cat`) waits
/// for input when awaited by reference. Awaiting an owned command closes an
/// untaken stdin first, since nothing else can reach it.
///
/// # Panics
///
/// Starting the process (awaiting, or calling [`ShellCommand::stdin`] or
/// [`ShellCommand::stream_lines`]) panics outside of a tokio runtime.
#[derive(Debug)]
pub struct ShellCommand {
    command_line: String,
    config: CommandConfig,
    stdout_tap: Mutex<Option<ChunkTap>>,
    started: OnceLock<Started>,
}

impl ShellCommand {
    /// Create a pending command with built-in defaults.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self::with_config(command_line, CommandConfig::default())
    }

    /// Create a pending command seeded from loaded defaults.
    pub fn with_defaults(command_line: impl Into<String>, defaults: &Defaults) -> Self {
        Self::with_config(command_line, CommandConfig::from_defaults(defaults))
    }

    /// Create a pending command with an explicit configuration.
    pub fn with_config(command_line: impl Into<String>, config: CommandConfig) -> Self {
        Self {
            command_line: command_line.into(),
            config,
            stdout_tap: Mutex::new(None),
            started: OnceLock::new(),
        }
    }

    /// The command line handed to the shell.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Current configuration.
    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /// Whether the process has been started.
    pub fn is_started(&self) -> bool {
        self.started.get().is_some()
    }

    fn configure(mut self, setting: &str, apply: impl FnOnce(&mut CommandConfig)) -> Self {
        if self.is_started() {
            warn!(
                "ignoring `{}` on `{}`: command already started",
                setting, self.command_line
            );
        } else {
            apply(&mut self.config);
        }
        self
    }

    /// Set the shell binary.
    pub fn shell(self, shell: impl Into<String>) -> Self {
        let shell = shell.into();
        self.configure("shell", |c| c.shell = Some(shell))
    }

    /// Set the working directory.
    pub fn cwd(self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.configure("cwd", |c| c.working_dir = Some(dir))
    }

    /// Add an environment variable to the overlay.
    pub fn env(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        self.configure("env", |c| {
            c.env.insert(key, value);
        })
    }

    /// Merge several variables into the environment overlay.
    pub fn envs<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.configure("envs", |c| c.env.extend(vars))
    }

    /// Kill the process if it runs longer than `duration`.
    pub fn timeout(self, duration: Duration) -> Self {
        self.configure("timeout", |c| c.timeout = Some(duration))
    }

    /// Stop forwarding output to the parent's streams.
    pub fn quiet(self) -> Self {
        self.configure("quiet", |c| c.quiet = true)
    }

    /// Forward output to the parent's streams (the default).
    pub fn verbose(self) -> Self {
        self.configure("verbose", |c| c.quiet = false)
    }

    /// Resolve failures as unsuccessful outputs instead of errors.
    pub fn nothrow(self) -> Self {
        self.configure("nothrow", |c| c.nothrow = true)
    }

    /// Report failures as errors (the default).
    pub fn throws(self) -> Self {
        self.configure("throws", |c| c.nothrow = false)
    }

    fn ensure_started(&self) -> &Started {
        self.started.get_or_init(|| {
            let tap = self
                .stdout_tap
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            ProcessRunner::start(&self.command_line, &self.config, tap)
        })
    }

    /// OS process id, once started. `None` if spawning failed.
    pub fn pid(&self) -> Option<u32> {
        self.started.get().and_then(|s| s.pid)
    }

    /// Take the child's stdin, starting the process if needed.
    ///
    /// Returns `None` on later calls or if spawning failed. Drop (or shut
    /// down) the handle to signal end of input.
    pub fn stdin(&self) -> Option<ChildStdin> {
        self.ensure_started()
            .stdin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Stream stdout line by line while the command runs.
    ///
    /// Must be called before the process starts, and only once. The output
    /// is still captured, so the command can be awaited afterwards.
    pub fn stream_lines(&self) -> Result<LineStream> {
        if self.is_started() {
            return Err(ShellCaptureError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .stdout_tap
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.ensure_started();

        // Another caller won the start; our tap was never wired.
        let unused = self
            .stdout_tap
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if unused.is_some() {
            return Err(ShellCaptureError::AlreadyStarted);
        }
        Ok(LineStream::new(rx))
    }

    async fn resolve(&self) -> std::result::Result<Output, CommandError> {
        let mut outcome = self.ensure_started().outcome.clone();
        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone());

        match settled {
            Ok(Some(resolution)) => resolution,
            _ => Err(CommandError::Disconnect {
                source: Arc::new(std::io::Error::other(
                    "process supervisor exited without reporting an outcome",
                )),
                output: Output::new(Vec::new(), Vec::new(), ABORTED_EXIT_CODE, None, Duration::ZERO)
                    .with_quiet(self.config.quiet),
            }),
        }
    }

    /// Wait for the command and return its output.
    ///
    /// Does not close stdin: if the command reads input, take and drop
    /// [`ShellCommand::stdin`] first or this waits for the command to
    /// finish on its own.
    pub async fn output(&self) -> Result<Output> {
        Ok(self.resolve().await?)
    }

    /// Stdout as text.
    pub async fn text(&self) -> Result<String> {
        Ok(self.output().await?.text())
    }

    /// Stdout parsed as permissive JSON; `None` if it does not parse.
    pub async fn json(&self) -> Result<Option<Value>> {
        Ok(self.output().await?.json())
    }

    /// Stdout bytes.
    pub async fn bytes(&self) -> Result<Arc<[u8]>> {
        Ok(self.output().await?.bytes())
    }

    /// Stdout as a blob.
    pub async fn blob(&self) -> Result<Blob> {
        Ok(self.output().await?.blob())
    }

    /// Stdout split into lines after the command finishes.
    pub async fn lines(&self) -> Result<Vec<String>> {
        Ok(self.output().await?.lines())
    }
}

type OutputFuture<'a> = Pin<Box<dyn Future<Output = Result<Output>> + Send + 'a>>;

impl IntoFuture for ShellCommand {
    type Output = Result<Output>;
    type IntoFuture = OutputFuture<'static>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            // Unreachable for the caller once moved in here.
            drop(self.stdin());
            self.output().await
        })
    }
}

impl<'a> IntoFuture for &'a ShellCommand {
    type Output = Result<Output>;
    type IntoFuture = OutputFuture<'a>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_not_started() {
        let cmd = shell("echo hi");
        assert_eq!(cmd.command_line(), "echo hi");
        assert!(!cmd.is_started());
        assert!(cmd.pid().is_none());
    }

    #[test]
    fn test_setters_chain() {
        let cmd = shell("make")
            .shell("/bin/bash")
            .cwd("/tmp")
            .env("A", "1")
            .envs([("B", "2"), ("C", "3")])
            .timeout(Duration::from_secs(5))
            .quiet()
            .nothrow();

        let config = cmd.config();
        assert_eq!(config.shell.as_deref(), Some("/bin/bash"));
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.env.len(), 3);
        assert_eq!(config.env.get("B").map(String::as_str), Some("2"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(config.quiet);
        assert!(config.nothrow);
    }

    #[test]
    fn test_inverse_setters() {
        let cmd = shell("true").quiet().verbose().nothrow().throws();
        assert!(!cmd.config().quiet);
        assert!(!cmd.config().nothrow);
    }

    #[test]
    fn test_with_defaults() {
        let defaults = Defaults {
            quiet: true,
            timeout_ms: Some(250),
            ..Defaults::default()
        };
        let cmd = ShellCommand::with_defaults("ls", &defaults);
        assert!(cmd.config().quiet);
        assert_eq!(cmd.config().timeout, Some(Duration::from_millis(250)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setters_after_start_are_ignored() {
        let cmd = shell("true").quiet();
        cmd.output().await.unwrap();
        let cmd = cmd.env("LATE", "1").nothrow();
        assert!(cmd.config().env.is_empty());
        assert!(!cmd.config().nothrow);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stream_lines_after_start_fails() {
        let cmd = shell("true").quiet();
        let _ = cmd.output().await;
        assert!(matches!(
            cmd.stream_lines(),
            Err(ShellCaptureError::AlreadyStarted)
        ));
    }
}
