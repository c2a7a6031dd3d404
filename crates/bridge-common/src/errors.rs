//! Error types for the process bridge.
//!
//! [`Error`] is the general error for code built on the bridge, with I/O and
//! context wrapping. Every failure that can happen on the parent side of a
//! spawn or wait is a [`ProcessError`], which converts into it. Failures on the child side between fork and exec never
//! reach this type: the child reports them on stderr and exits with status 1.
//!
//! ```rust
//! use bridge_common::{ProcessError, ProcessResult};
//! use nix::errno::Errno;
//!
//! fn reap(pid: i32) -> ProcessResult<()> {
//!     Err(ProcessError::wait_failed(pid, Errno::ECHILD))
//! }
//!
//! let err = reap(42).unwrap_err();
//! assert_eq!(err.errno(), Some(Errno::ECHILD));
//! ```

use nix::errno::Errno;
use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// General error for code built on the bridge.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input or configuration.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A spawn, channel or wait failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext { message: String, source: Box<Error> },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Adds context to an error.
    ///
    /// ```
    /// use bridge_common::{Error, Result};
    ///
    /// fn read_header() -> Result<()> {
    ///     Err(Error::validation("short header"))
    /// }
    ///
    /// let err = read_header().map_err(|e| e.context("Failed to read frame")).unwrap_err();
    /// assert_eq!(err.to_string(), "Failed to read frame: Validation error: short header");
    /// ```
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

// Convenience methods for Result types
pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }
}

/// Process-specific error types for channel setup, spawning and reaping.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Channel creation failed: {errno}")]
    ChannelFailed { errno: Errno },

    #[error("Fork failed: {errno}")]
    ForkFailed { errno: Errno },

    #[error("Failed to close descriptor {fd}: {errno}")]
    CloseFailed { fd: i32, errno: Errno },

    #[error("Failed to update descriptor {fd} flags: {errno}")]
    DescriptorFlags { fd: i32, errno: Errno },

    #[error("Invalid argument vector: {reason}")]
    InvalidArguments { reason: String },

    #[error("Invalid channel endpoint '{value}': {reason}")]
    InvalidEndpoint { value: String, reason: String },

    #[error("Wait failed for pid {pid}: {errno}")]
    WaitFailed { pid: i32, errno: Errno },
}

impl ProcessError {
    pub fn channel_failed(errno: Errno) -> Self {
        Self::ChannelFailed { errno }
    }

    pub fn fork_failed(errno: Errno) -> Self {
        Self::ForkFailed { errno }
    }

    pub fn close_failed(fd: i32, errno: Errno) -> Self {
        Self::CloseFailed { fd, errno }
    }

    pub fn descriptor_flags(fd: i32, errno: Errno) -> Self {
        Self::DescriptorFlags { fd, errno }
    }

    pub fn invalid_arguments(reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            reason: reason.into(),
        }
    }

    pub fn invalid_endpoint(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn wait_failed(pid: i32, errno: Errno) -> Self {
        Self::WaitFailed { pid, errno }
    }

    /// The OS error behind this failure, if it came from a syscall.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::ChannelFailed { errno }
            | Self::ForkFailed { errno }
            | Self::CloseFailed { errno, .. }
            | Self::DescriptorFlags { errno, .. }
            | Self::WaitFailed { errno, .. } => Some(*errno),
            Self::InvalidArguments { .. } | Self::InvalidEndpoint { .. } => None,
        }
    }
}

impl From<ProcessError> for std::io::Error {
    fn from(err: ProcessError) -> Self {
        match err.errno() {
            Some(errno) => std::io::Error::new(std::io::Error::from(errno).kind(), err),
            None => std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
        }
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
