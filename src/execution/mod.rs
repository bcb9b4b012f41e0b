//! Command execution engine.
//!
//! This module runs one shell command per [`ShellCommand`]:
//! - Lazy, memoized start on first await or terminal accessor
//! - Concurrent stdout/stderr capture with live forwarding
//! - One-shot settlement across exit, error and timeout
//! - Stdin passthrough and live line streaming
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_capture::execution::shell;
//!
//! # async fn demo() -> shell_capture::Result<()> {
//! let out = shell("echo hello").quiet().await?;
//! assert_eq!(out.text(), "hello\n");
//!
//! let probe = shell("exit 3").nothrow().timeout(Duration::from_secs(5));
//! assert_eq!((&probe).await?.exit_code(), 3);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod arbiter;
mod command;
mod invocation;
mod lines;
mod runner;

pub use command::{quote, shell_flag, CommandConfig, HOST_DEFAULT_SHELL};
pub use invocation::{shell, ShellCommand};
pub use lines::LineStream;
