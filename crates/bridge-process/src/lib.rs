//! # Bridge Process
//!
//! Low-level process operations for the process bridge:
//! - Connected duplex channels between parent and child
//! - Fork/exec spawning with a sanitized descriptor table
//! - Program image replacement
//! - Blocking reaping of spawned children
//!
//! ```rust,no_run
//! use bridge_process::{spawn_process, wait_process};
//! use std::io::{Read, Write};
//!
//! let mut spawned = spawn_process(|fd| {
//!     vec!["my-worker".to_string(), "--ipc-fd".to_string(), fd.to_string()]
//! })?;
//! spawned.channel.write_all(b"hello")?;
//! let mut reply = [0u8; 5];
//! spawned.channel.read_exact(&mut reply)?;
//! let status = wait_process(spawned.pid)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(not(unix))]
compile_error!("bridge-process requires a Unix platform with fork/exec");

pub mod channel;
pub mod descriptors;
pub mod exec;
pub mod spawn;
pub mod wait;

// Re-export main types
pub use channel::{adopt_endpoint, create_channel, ChannelPair};
pub use descriptors::{close_descriptors_except, max_fd};
pub use exec::{exec_process, ExecArgs, EXEC_FAILURE_STATUS};
pub use spawn::{spawn_process, SpawnedProcess};
pub use wait::{wait_process, ChildPid};
