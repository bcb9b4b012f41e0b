//! Captured output and its decoded views.
//!
//! This module provides read-only accessors over a finished command:
//! - Text, raw bytes and blob views of stdout
//! - Permissive JSON decoding (comments and trailing commas tolerated)
//! - Line splitting over the frozen buffer
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use shell_capture::output::Output;
//!
//! let out = Output::new(b"{\"ok\": true,}\n".to_vec(), Vec::new(), 0, None, Duration::ZERO);
//! assert!(out.success());
//! assert_eq!(out.json().unwrap()["ok"], true);
//! assert_eq!(out.lines().len(), 1);
//! ```

mod blob;
pub mod relaxed;
mod result;

pub use blob::Blob;
pub use result::{Output, ABORTED_EXIT_CODE};
