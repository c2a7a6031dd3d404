//! # Bridge Common
//!
//! Types and helpers shared by the process bridge crates: the error types for
//! spawn/wait failures and for code built on top of them, plus two small
//! diagnostic helpers used when logging.

pub mod errors;
pub mod escape;
pub mod thread;

// Re-export commonly used items
pub use errors::{Error, ProcessError, ProcessResult, Result, ResultExt};
pub use escape::{log_escape, MAX_ESCAPED_LEN, TRUNCATION_MARKER};
pub use thread::{os_thread_name, thread_name};
