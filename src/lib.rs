//! # shell-capture
//!
//! Lazily started shell commands with captured, forwarded and decoded output.
//!
//! A [`ShellCommand`] is configured with chained setters and runs the first
//! time it is awaited or a terminal accessor is called. Stdout and stderr
//! are drained concurrently, mirrored to the parent's streams unless the
//! command is quiet, and exposed afterwards as text, JSON, bytes, a blob or
//! lines.
//!
//! ## Features
//!
//! - **Lazy, single start**: awaiting twice never spawns twice
//! - **Live forwarding**: output is mirrored as it arrives, or suppressed with `quiet()`
//! - **No-throw mode**: failures resolve to an unsuccessful [`Output`]
//! - **Stdin passthrough** and **live line streaming**
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_capture::{sh, shell};
//!
//! #[tokio::main]
//! async fn main() -> shell_capture::Result<()> {
//!     shell_capture::logging::try_init().ok();
//!
//!     let branch = shell("git rev-parse --abbrev-ref HEAD").quiet().text().await?;
//!     println!("on branch {}", branch.trim());
//!
//!     let status = sh!("test -d {}", "some dir").nothrow().await?;
//!     println!("exists: {}", status.success());
//!
//!     let pkg = shell("cat package.json").quiet().timeout(Duration::from_secs(5));
//!     if let Some(json) = pkg.json().await? {
//!         println!("name: {}", json["name"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
mod macros;
pub mod output;

// Re-export commonly used types
pub use config::Defaults;
pub use error::{CommandError, Result, ShellCaptureError};
pub use execution::{quote, shell, CommandConfig, LineStream, ShellCommand};
pub use output::{Blob, Output, ABORTED_EXIT_CODE};
