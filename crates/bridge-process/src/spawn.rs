//! Spawning a child process connected to its parent by a private channel.
//!
//! The sequence is: create a socket pair, build the child's argument vector,
//! fork, let each side close the endpoint it does not own, then in the child
//! sanitize the descriptor table and exec. The parent gets its endpoint back
//! as a [`UnixStream`] together with the child's [`ChildPid`].
//!
//! Between fork and exec the child runs on a copy of a possibly multi-threaded
//! address space, so it only issues raw syscalls: no allocation, no logging,
//! no locks. That is why the argument vector is produced and encoded in the
//! parent just before forking; the child's endpoint keeps the same descriptor
//! number on both sides of the fork.
//!
//! The raw fork step stays private to this crate; a safe caller could
//! otherwise run arbitrary code in the forked child:
//!
//! ```compile_fail
//! use bridge_process::spawn::fork_with_channel;
//! ```

use crate::channel::{create_channel, set_cloexec, ChannelPair};
use crate::descriptors::close_descriptors_except;
use crate::exec::{fail_child, ExecArgs};
use crate::wait::ChildPid;
use bridge_common::{log_escape, ProcessError, ProcessResult};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{close, fork, ForkResult};
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use tracing::{debug, info, warn};

/// A running child and the parent's end of its channel.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub channel: UnixStream,
    pub pid: ChildPid,
}

/// Which side of the fork the caller is on, with the endpoint that side owns.
#[derive(Debug)]
pub(crate) enum Role {
    Parent { endpoint: OwnedFd, child: ChildPid },
    Child { endpoint: OwnedFd },
}

/// Spawn a child connected to this process by a duplex channel.
///
/// `fd_to_args` receives the descriptor number the child's endpoint will have
/// and returns the argument vector to exec; it typically renders the number
/// into an argument so the new program can call
/// [`adopt_endpoint`](crate::channel::adopt_endpoint). It runs in the parent,
/// before the fork, so its side effects happen exactly once, in the calling
/// process.
///
/// Fails without creating a process if the channel cannot be created, the
/// argument vector is invalid, or fork fails. If the child cannot exec, it
/// exits with [`EXEC_FAILURE_STATUS`](crate::exec::EXEC_FAILURE_STATUS), which
/// the caller observes through [`wait_process`](crate::wait::wait_process).
pub fn spawn_process<F>(fd_to_args: F) -> ProcessResult<SpawnedProcess>
where
    F: FnOnce(RawFd) -> Vec<String>,
{
    let pair = create_channel()?;
    let args = fd_to_args(pair.child.as_raw_fd());
    let exec_args = ExecArgs::new(args)?;
    debug!(
        "Spawning {} (child fd={})",
        log_escape(exec_args.argv().iter().map(|a| a.as_bytes())),
        pair.child.as_raw_fd()
    );

    match fork_with_channel(pair)? {
        Role::Parent { endpoint, child } => {
            info!(
                "Spawned pid {} ({})",
                child,
                log_escape([exec_args.program().to_bytes()])
            );
            Ok(SpawnedProcess {
                channel: UnixStream::from(endpoint),
                pid: child,
            })
        }
        Role::Child { endpoint } => run_child(endpoint, &exec_args),
    }
}

/// Fork and split `pair` between the two resulting processes.
///
/// Each side closes the endpoint it does not own before this returns. In the
/// child a failed close ends the process; in the parent it is returned as an
/// error after the child has been killed and reaped.
///
/// The child side must go straight to exec: see the module docs.
pub(crate) fn fork_with_channel(pair: ChannelPair) -> ProcessResult<Role> {
    let ChannelPair { parent, child } = pair;

    // SAFETY: the child branch below only closes descriptors and returns the
    // endpoint to `spawn_process`, whose only child path is `run_child`.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child: pid }) => {
            let fd = child.into_raw_fd();
            if let Err(errno) = close(fd) {
                warn!("Failed to close child endpoint {} in parent: {}", fd, errno);
                let _ = kill(pid, Signal::SIGKILL);
                let _ = waitpid(pid, None);
                return Err(ProcessError::close_failed(fd, errno));
            }
            Ok(Role::Parent {
                endpoint: parent,
                child: ChildPid::from(pid),
            })
        }
        Ok(ForkResult::Child) => {
            if let Err(errno) = close(parent.into_raw_fd()) {
                fail_child(b"close failed", b"parent endpoint", errno);
            }
            Ok(Role::Child { endpoint: child })
        }
        Err(errno) => Err(ProcessError::fork_failed(errno)),
    }
}

/// Child side: strip inherited descriptors and become the new program.
fn run_child(endpoint: OwnedFd, exec_args: &ExecArgs) -> ! {
    let fd = endpoint.into_raw_fd();
    close_descriptors_except(fd);
    if let Err(e) = set_cloexec(fd, false) {
        let errno = e.errno().unwrap_or(nix::errno::Errno::EBADF);
        fail_child(b"fcntl failed", b"child endpoint", errno);
    }
    exec_args.exec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::EXEC_FAILURE_STATUS;
    use crate::wait::wait_process;
    use nix::errno::Errno;
    use std::io::Read;

    #[test]
    fn test_spawn_and_wait() {
        let spawned = spawn_process(|_| vec!["true".to_string()]).unwrap();
        let status = wait_process(spawned.pid).unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_callback_sees_child_endpoint() {
        let mut seen = None;
        let spawned = spawn_process(|fd| {
            seen = Some(fd);
            vec!["true".to_string()]
        })
        .unwrap();

        let seen = seen.unwrap();
        assert!(seen >= crate::descriptors::RESERVED_FD_WATERMARK);
        assert_ne!(seen, spawned.channel.as_raw_fd());
        wait_process(spawned.pid).unwrap();
    }

    #[test]
    fn test_parent_sees_eof_after_child_exits() {
        // The parent closed its copy of the child endpoint and the child
        // closed its own on exit, so nothing else holds the other end.
        let mut spawned = spawn_process(|_| vec!["true".to_string()]).unwrap();
        let status = wait_process(spawned.pid).unwrap();
        assert!(status.success());

        let mut buf = Vec::new();
        let n = spawned.channel.read_to_end(&mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_missing_program_exits_with_failure_status() {
        let spawned =
            spawn_process(|_| vec!["bridge-process-test-no-such-program".to_string()]).unwrap();
        let status = wait_process(spawned.pid).unwrap();
        assert_eq!(status.code(), Some(EXEC_FAILURE_STATUS));
    }

    #[test]
    fn test_child_exit_code_is_reported() {
        let spawned = spawn_process(|_| {
            vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()]
        })
        .unwrap();
        let status = wait_process(spawned.pid).unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn test_invalid_args_do_not_fork() {
        let err = spawn_process(|_| Vec::new()).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArguments { .. }));

        let err = spawn_process(|_| vec!["a\0b".to_string()]).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidArguments { .. }));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_inherited_descriptors_do_not_leak() {
        // dup() clears close-on-exec, so only sanitization keeps this out of the child.
        let file = std::fs::File::open("/dev/null").unwrap();
        let leaked = nix::unistd::dup(file.as_raw_fd()).unwrap();

        let spawned = spawn_process(|fd| {
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!(
                    "test -e /proc/self/fd/{leaked} && exit 3; test -e /proc/self/fd/{fd} || exit 4; exit 0",
                    leaked = leaked,
                    fd = fd
                ),
            ]
        })
        .unwrap();
        let status = wait_process(spawned.pid).unwrap();
        nix::unistd::close(leaked).unwrap();

        assert_eq!(status.code(), Some(0), "child saw {:?}", status);
    }

    #[test]
    fn test_callback_effects_stay_in_parent() {
        let mut calls = Vec::new();
        let spawned = spawn_process(|fd| {
            calls.push(fd);
            vec!["true".to_string()]
        })
        .unwrap();
        assert!(wait_process(spawned.pid).unwrap().success());

        // Exactly one invocation, observed here rather than lost in a child.
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_each_pid_is_waited_once() {
        let spawned = spawn_process(|_| vec!["true".to_string()]).unwrap();
        let raw = spawned.pid.as_raw();
        assert!(wait_process(spawned.pid).unwrap().success());

        let err = wait_process(ChildPid::from_raw(raw)).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::ECHILD));
    }
}
