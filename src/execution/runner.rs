//! Process spawning and stream draining.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use super::accumulator::{OutputAccumulator, OutputSource};
use super::arbiter::{CompletionArbiter, CompletionEvent, Resolution};
use super::command::{shell_flag, CommandConfig};

/// Buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 8192;

/// Sender that receives a copy of every stdout chunk.
pub(crate) type ChunkTap = mpsc::UnboundedSender<Vec<u8>>;

/// Handles to a process that has been started.
#[derive(Debug)]
pub(crate) struct Started {
    /// OS process id, absent if spawning failed.
    pub(crate) pid: Option<u32>,
    /// Child stdin, until a caller takes it.
    pub(crate) stdin: Mutex<Option<ChildStdin>>,
    /// Receives the outcome once the arbiter settles.
    pub(crate) outcome: watch::Receiver<Option<Resolution>>,
}

/// Spawns one child per invocation and drives it to completion.
pub(crate) struct ProcessRunner;

impl ProcessRunner {
    /// Spawn `command_line` under the configured shell.
    ///
    /// Never fails directly: a spawn error settles the outcome immediately
    /// and is reported through [`Started::outcome`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub(crate) fn start(
        command_line: &str,
        config: &CommandConfig,
        stdout_tap: Option<ChunkTap>,
    ) -> Started {
        let shell = config.resolved_shell();
        let accumulator = Arc::new(OutputAccumulator::new(!config.quiet));
        let (arbiter, outcome) =
            CompletionArbiter::new(Arc::clone(&accumulator), shell, config.quiet, config.nothrow);
        let arbiter = Arc::new(arbiter);

        debug!("spawning `{} {} {}`", shell, shell_flag(shell), command_line);
        let mut child = match build_command(command_line, config).spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!("spawn failed: {}", e);
                arbiter.settle(CompletionEvent::SpawnFailed(e));
                return Started {
                    pid: None,
                    stdin: Mutex::new(None),
                    outcome,
                };
            }
        };

        let pid = child.id();
        let stdin = child.stdin.take();
        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(tokio::spawn(drain(
                stdout,
                OutputSource::Stdout,
                Arc::clone(&accumulator),
                Arc::clone(&arbiter),
                stdout_tap,
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(tokio::spawn(drain(
                stderr,
                OutputSource::Stderr,
                accumulator,
                Arc::clone(&arbiter),
                None,
            )));
        }

        let deadline = config
            .timeout
            .map(|limit| (limit, Instant::now() + limit));
        tokio::spawn(supervise(child, deadline, drains, arbiter));

        Started {
            pid,
            stdin: Mutex::new(stdin),
            outcome,
        }
    }
}

fn build_command(command_line: &str, config: &CommandConfig) -> Command {
    let shell = config.resolved_shell();
    let mut cmd = Command::new(shell);
    cmd.arg(shell_flag(shell))
        .arg(command_line)
        .env_clear()
        .envs(config.resolved_env())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }

    // Own process group, so a timeout can take down the whole tree.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.as_std_mut().process_group(0);
    }

    cmd
}

/// Read one stream until EOF, feeding the accumulator.
async fn drain<R>(
    mut reader: R,
    source: OutputSource,
    accumulator: Arc<OutputAccumulator>,
    arbiter: Arc<CompletionArbiter>,
    tap: Option<ChunkTap>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                trace!("{:?}: EOF", source);
                break;
            }
            Ok(n) => {
                let chunk = &buf[..n];
                accumulator.absorb(source, chunk).await;
                if let Some(ref tap) = tap {
                    // The line consumer may have gone away; capture continues.
                    let _ = tap.send(chunk.to_vec());
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("{:?}: read error: {}", source, e);
                arbiter.settle(CompletionEvent::Disconnected(e));
                break;
            }
        }
    }
}

/// Wait for exit and for both drains, then settle.
///
/// One deadline covers the whole run: descendants that keep a pipe open
/// after the shell exits are killed along with the group.
async fn supervise(
    mut child: Child,
    deadline: Option<(Duration, Instant)>,
    drains: Vec<JoinHandle<()>>,
    arbiter: Arc<CompletionArbiter>,
) {
    let pgid = child.id();
    let aborts: Vec<AbortHandle> = drains.iter().map(JoinHandle::abort_handle).collect();
    let mut timed_out = false;

    let status = match deadline {
        Some((limit, at)) => match tokio::time::timeout_at(at, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!("command timed out after {:?}, terminating", limit);
                timed_out = true;
                terminate(&mut child, pgid);
                child.wait().await
            }
        },
        None => child.wait().await,
    };

    let mut joined = Box::pin(join_drains(drains));
    match deadline {
        Some((limit, at)) if !timed_out => {
            if tokio::time::timeout_at(at, &mut joined).await.is_err() {
                warn!(
                    "command output still open after {:?}, terminating process group",
                    limit
                );
                timed_out = true;
                terminate(&mut child, pgid);
                // Without a process group the pipe holders cannot be reached.
                #[cfg(not(unix))]
                aborts.iter().for_each(AbortHandle::abort);
                joined.await;
            }
        }
        _ => joined.await,
    }
    drop(aborts);

    let event = match status {
        Ok(_) if timed_out => CompletionEvent::killed(),
        Ok(status) => CompletionEvent::exited(status),
        Err(e) => CompletionEvent::Disconnected(e),
    };
    if !arbiter.settle(event) {
        trace!("exit observed after the outcome was already settled");
    }
}

async fn join_drains(drains: Vec<JoinHandle<()>>) {
    for drain in drains {
        match drain.await {
            Err(e) if e.is_cancelled() => trace!("output drain cancelled"),
            Err(e) => error!("output drain task failed: {}", e),
            Ok(()) => {}
        }
    }
}

/// Kill the process group led by `pgid`, falling back to the direct child.
///
/// The group outlives its leader, so this still works after the shell has
/// been reaped.
fn terminate(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid.and_then(|pid| i32::try_from(pid).ok()) {
            // SAFETY: kill(2) with a negative pid only signals the group we created.
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc == 0 {
                return;
            }
            debug!(
                "killing process group {} failed: {}",
                pgid,
                std::io::Error::last_os_error()
            );
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    if let Err(e) = child.start_kill() {
        debug!("kill failed: {}", e);
    }
}
