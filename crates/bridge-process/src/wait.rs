//! Reaping spawned children.

use bridge_common::{ProcessError, ProcessResult};
use nix::errno::Errno;
use nix::libc;
use nix::unistd::Pid;
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use tracing::debug;

/// Identifier of a child this process forked and has not reaped yet.
///
/// Not `Clone`: [`wait_process`] consumes it, after which the OS may reuse the
/// number.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ChildPid(Pid);

impl ChildPid {
    /// Wrap a raw pid, e.g. one received from a collaborator.
    ///
    /// Values of zero or below never name a single child; waiting on them fails.
    pub fn from_raw(pid: i32) -> Self {
        Self(Pid::from_raw(pid))
    }

    pub fn as_raw(&self) -> i32 {
        self.0.as_raw()
    }

    pub fn as_pid(&self) -> Pid {
        self.0
    }
}

impl From<Pid> for ChildPid {
    fn from(pid: Pid) -> Self {
        Self(pid)
    }
}

impl fmt::Display for ChildPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block until `pid` terminates and return its raw wait status.
///
/// The status is returned as an [`ExitStatus`] built from the raw value, so
/// `code()`, `signal()` and `into_raw()` are all available to the caller.
/// Fails with `ECHILD` if `pid` is not an unreaped child of this process.
/// Non-positive ids are rejected the same way before any syscall: `waitpid`
/// would read them as "any child" and consume a status that belongs to
/// another waiter. A wait interrupted by a signal is resumed.
///
/// This call cannot be cancelled; callers that need a timeout run it on a
/// dedicated thread and race it.
pub fn wait_process(pid: ChildPid) -> ProcessResult<ExitStatus> {
    let raw_pid = pid.as_raw();
    if raw_pid <= 0 {
        return Err(ProcessError::wait_failed(raw_pid, Errno::ECHILD));
    }

    let mut status: libc::c_int = 0;
    loop {
        // SAFETY: `status` is a valid, writable c_int for the duration of the call.
        let ret = unsafe { libc::waitpid(raw_pid, &mut status, 0) };
        match Errno::result(ret) {
            Ok(reaped) if reaped == raw_pid => break,
            Ok(_) => return Err(ProcessError::wait_failed(raw_pid, Errno::ECHILD)),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(ProcessError::wait_failed(raw_pid, errno)),
        }
    }

    let status = ExitStatus::from_raw(status);
    debug!("Reaped pid {}: {}", raw_pid, status);
    Ok(status)
}
