//! One-shot settlement of an invocation.
//!
//! Several tasks race to finish an invocation: the stdout and stderr
//! drains (on a read error), the supervisor (on exit or wait error) and
//! the spawner (on spawn failure). The first to call
//! [`CompletionArbiter::settle`] decides the outcome; later calls are
//! no-ops.

use std::io::Write;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, trace};

use super::accumulator::OutputAccumulator;
use crate::error::CommandError;
use crate::output::{Output, ABORTED_EXIT_CODE};

/// Final value published to every awaiter.
pub(crate) type Resolution = std::result::Result<Output, CommandError>;

/// Event that can finish an invocation.
#[derive(Debug)]
pub(crate) enum CompletionEvent {
    /// The process closed normally.
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// The process could not be created.
    SpawnFailed(std::io::Error),
    /// A stream or wait call failed independently of a clean exit.
    Disconnected(std::io::Error),
}

impl CompletionEvent {
    pub(crate) fn exited(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self::Exited {
            code: status.code(),
            signal,
        }
    }

    /// The group was killed by the timeout, whatever the shell exited with.
    pub(crate) fn killed() -> Self {
        #[cfg(unix)]
        let signal = Some(libc::SIGKILL);
        #[cfg(not(unix))]
        let signal = None;

        Self::Exited { code: None, signal }
    }
}

/// Decides success or failure exactly once.
#[derive(Debug)]
pub(crate) struct CompletionArbiter {
    closed: AtomicBool,
    accumulator: Arc<OutputAccumulator>,
    shell: String,
    quiet: bool,
    nothrow: bool,
    started_at: Instant,
    tx: watch::Sender<Option<Resolution>>,
}

impl CompletionArbiter {
    pub(crate) fn new(
        accumulator: Arc<OutputAccumulator>,
        shell: impl Into<String>,
        quiet: bool,
        nothrow: bool,
    ) -> (Self, watch::Receiver<Option<Resolution>>) {
        let (tx, rx) = watch::channel(None);
        let arbiter = Self {
            closed: AtomicBool::new(false),
            accumulator,
            shell: shell.into(),
            quiet,
            nothrow,
            started_at: Instant::now(),
            tx,
        };
        (arbiter, rx)
    }

    /// Whether an outcome has already been published.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish the outcome for `event` unless one already exists.
    ///
    /// Returns `true` if this call decided the outcome.
    pub(crate) fn settle(&self, event: CompletionEvent) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("ignoring late completion event: {:?}", event);
            return false;
        }

        let resolution = self.resolve(event);
        match &resolution {
            Ok(output) => debug!(
                "command settled: exit={} success={}",
                output.exit_code(),
                output.success()
            ),
            Err(e) => debug!("command failed: exit={} ({})", e.exit_code(), e),
        }
        self.tx.send_replace(Some(resolution));
        true
    }

    fn resolve(&self, event: CompletionEvent) -> Resolution {
        let (stdout, stderr) = self.accumulator.snapshot();
        let elapsed = self.started_at.elapsed();

        match event {
            CompletionEvent::Exited { code: Some(0), .. } => {
                Ok(Output::new(stdout, stderr, 0, None, elapsed).with_quiet(self.quiet))
            }
            CompletionEvent::Exited { code, signal } => {
                let exit_code = code.unwrap_or(ABORTED_EXIT_CODE);
                let output =
                    Output::new(stdout, stderr, exit_code, signal, elapsed).with_quiet(self.quiet);
                if self.nothrow {
                    return Ok(output);
                }
                let message = if output.stderr_bytes().is_empty() {
                    format!("command failed with code {exit_code}")
                } else {
                    output.stderr()
                };
                Err(CommandError::NonZeroExit { message, output })
            }
            CompletionEvent::SpawnFailed(source) => {
                self.report(&source);
                let output = Output::new(stdout, stderr, ABORTED_EXIT_CODE, None, elapsed)
                    .with_quiet(self.quiet);
                if self.nothrow {
                    return Ok(output);
                }
                Err(CommandError::Spawn {
                    shell: self.shell.clone(),
                    source: Arc::new(source),
                    output,
                })
            }
            CompletionEvent::Disconnected(source) => {
                self.report(&source);
                let output = Output::new(stdout, stderr, ABORTED_EXIT_CODE, None, elapsed)
                    .with_quiet(self.quiet);
                if self.nothrow {
                    return Ok(output);
                }
                Err(CommandError::Disconnect {
                    source: Arc::new(source),
                    output,
                })
            }
        }
    }

    fn report(&self, error: &std::io::Error) {
        if !self.quiet {
            let _ = writeln!(std::io::stderr(), "{}: {}", self.shell, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::accumulator::OutputSource;
    use std::io::ErrorKind;

    fn arbiter(nothrow: bool) -> (CompletionArbiter, watch::Receiver<Option<Resolution>>) {
        let acc = Arc::new(OutputAccumulator::new(false));
        CompletionArbiter::new(acc, "/bin/sh", true, nothrow)
    }

    fn resolved(rx: &watch::Receiver<Option<Resolution>>) -> Resolution {
        rx.borrow().clone().expect("settled")
    }

    #[test]
    fn test_clean_exit_is_success() {
        let (arbiter, rx) = arbiter(false);
        assert!(arbiter.settle(CompletionEvent::Exited {
            code: Some(0),
            signal: None
        }));
        let output = resolved(&rx).unwrap();
        assert!(output.success());
        assert_eq!(output.exit_code(), 0);
        assert!(output.stderr().is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_uses_stderr_message() {
        let acc = Arc::new(OutputAccumulator::new(false));
        acc.absorb(OutputSource::Stderr, b"boom\n").await;
        let (arbiter, rx) = CompletionArbiter::new(acc, "/bin/sh", true, false);

        arbiter.settle(CompletionEvent::Exited {
            code: Some(2),
            signal: None,
        });
        let err = resolved(&rx).unwrap_err();
        assert_eq!(err.to_string(), "boom\n");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_nonzero_exit_synthesized_message() {
        let (arbiter, rx) = arbiter(false);
        arbiter.settle(CompletionEvent::Exited {
            code: Some(3),
            signal: None,
        });
        let err = resolved(&rx).unwrap_err();
        assert_eq!(err.to_string(), "command failed with code 3");
    }

    #[test]
    fn test_signal_maps_to_sentinel() {
        let (arbiter, rx) = arbiter(true);
        arbiter.settle(CompletionEvent::Exited {
            code: None,
            signal: Some(9),
        });
        let output = resolved(&rx).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code(), ABORTED_EXIT_CODE);
        assert_eq!(output.signal(), Some(9));
    }

    #[test]
    fn test_killed_is_failure_even_after_clean_shell_exit() {
        let (arbiter, rx) = arbiter(false);
        assert!(arbiter.settle(CompletionEvent::killed()));
        let err = resolved(&rx).unwrap_err();
        assert!(matches!(err, CommandError::NonZeroExit { .. }));
        assert_eq!(err.exit_code(), ABORTED_EXIT_CODE);
        #[cfg(unix)]
        assert_eq!(err.output().signal(), Some(9));
    }

    #[test]
    fn test_spawn_failure_nothrow_resolves() {
        let (arbiter, rx) = arbiter(true);
        arbiter.settle(CompletionEvent::SpawnFailed(std::io::Error::new(
            ErrorKind::NotFound,
            "missing",
        )));
        let output = resolved(&rx).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code(), ABORTED_EXIT_CODE);
    }

    #[test]
    fn test_spawn_failure_throws() {
        let (arbiter, rx) = arbiter(false);
        arbiter.settle(CompletionEvent::SpawnFailed(std::io::Error::new(
            ErrorKind::NotFound,
            "missing",
        )));
        assert!(matches!(
            resolved(&rx),
            Err(CommandError::Spawn { .. })
        ));
    }

    #[test]
    fn test_first_event_wins() {
        let (arbiter, rx) = arbiter(false);
        assert!(arbiter.settle(CompletionEvent::Disconnected(std::io::Error::new(
            ErrorKind::BrokenPipe,
            "gone",
        ))));
        assert!(arbiter.is_closed());
        assert!(!arbiter.settle(CompletionEvent::Exited {
            code: Some(0),
            signal: None
        }));
        assert!(matches!(
            resolved(&rx),
            Err(CommandError::Disconnect { .. })
        ));
    }
}
