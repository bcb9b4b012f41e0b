//! Append-only capture buffers with live forwarding.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

/// Source of captured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Byte buffers for one invocation's stdout and stderr.
///
/// Each stream is appended in arrival order by its own drain task.
/// Forwarding to the parent's streams is best-effort: a failed write is
/// logged and never affects what was captured.
#[derive(Debug)]
pub(crate) struct OutputAccumulator {
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
    forward: bool,
}

impl OutputAccumulator {
    /// Create empty buffers. `forward` mirrors chunks to the parent streams.
    pub(crate) fn new(forward: bool) -> Self {
        Self {
            stdout: Mutex::new(Vec::new()),
            stderr: Mutex::new(Vec::new()),
            forward,
        }
    }

    fn buffer(&self, source: OutputSource) -> MutexGuard<'_, Vec<u8>> {
        let buffer = match source {
            OutputSource::Stdout => &self.stdout,
            OutputSource::Stderr => &self.stderr,
        };
        // A panic while appending cannot leave the Vec half-written.
        buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk, then forward it unless quiet.
    pub(crate) async fn absorb(&self, source: OutputSource, chunk: &[u8]) {
        self.buffer(source).extend_from_slice(chunk);
        trace!("captured {} bytes on {:?}", chunk.len(), source);

        if self.forward {
            if let Err(e) = forward(source, chunk).await {
                debug!("forwarding {:?} failed: {}", source, e);
            }
        }
    }

    /// Copy of both buffers as they are right now.
    pub(crate) fn snapshot(&self) -> (Vec<u8>, Vec<u8>) {
        let stdout = self.buffer(OutputSource::Stdout).clone();
        let stderr = self.buffer(OutputSource::Stderr).clone();
        (stdout, stderr)
    }
}

async fn forward(source: OutputSource, chunk: &[u8]) -> std::io::Result<()> {
    match source {
        OutputSource::Stdout => {
            let mut out = tokio::io::stdout();
            out.write_all(chunk).await?;
            out.flush().await
        }
        OutputSource::Stderr => {
            let mut err = tokio::io::stderr();
            err.write_all(chunk).await?;
            err.flush().await
        }
    }
}
