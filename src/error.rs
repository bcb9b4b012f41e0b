//! Error types for shell-capture.

use std::sync::Arc;

use thiserror::Error;

use crate::output::Output;

/// Failure of a single invocation.
///
/// Every variant carries the [`Output`] captured up to the point of failure,
/// so callers can still inspect partial stdout/stderr. The type is cheap to
/// clone; awaiting the same invocation twice yields the same error.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// The child process could not be created at all.
    #[error("failed to spawn `{shell}`: {source}")]
    Spawn {
        /// Shell binary that was requested.
        shell: String,
        /// Underlying OS error.
        #[source]
        source: Arc<std::io::Error>,
        /// Empty outcome with the sentinel exit code.
        output: Output,
    },

    /// The process ran and exited (or was terminated) with a nonzero code.
    #[error("{message}")]
    NonZeroExit {
        /// Captured stderr text, or a synthesized message when stderr is empty.
        message: String,
        /// Final outcome.
        output: Output,
    },

    /// A stream or wait-level disconnect independent of a clean exit.
    #[error("process disconnected: {source}")]
    Disconnect {
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
        /// Outcome accumulated before the disconnect.
        output: Output,
    },
}

impl CommandError {
    /// Outcome captured up to the failure.
    pub fn output(&self) -> &Output {
        match self {
            Self::Spawn { output, .. }
            | Self::NonZeroExit { output, .. }
            | Self::Disconnect { output, .. } => output,
        }
    }

    /// Effective exit code of the failed invocation.
    pub fn exit_code(&self) -> i32 {
        self.output().exit_code()
    }
}

/// Main error type for shell-capture operations.
#[derive(Error, Debug)]
pub enum ShellCaptureError {
    /// The invocation itself failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pre-start-only operation was used after the process started.
    #[error("command already started")]
    AlreadyStarted,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Command-line arguments were invalid.
    #[error("{0}")]
    Args(#[from] crate::cli::ArgsError),
}

impl ShellCaptureError {
    /// Exit code to report for this error, if it came from a child process.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command(err) => Some(err.exit_code()),
            _ => None,
        }
    }
}

/// Convenience Result type for shell-capture operations.
pub type Result<T> = std::result::Result<T, ShellCaptureError>;
