//! Program image replacement.
//!
//! [`ExecArgs`] converts an argument vector into C strings up front so that the
//! exec itself neither allocates nor fails on encoding. That matters in a
//! forked child, where only async-signal-safe calls are allowed until exec.

use bridge_common::{ProcessError, ProcessResult};
use nix::errno::Errno;
use nix::unistd::{execvp, write};
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::os::fd::AsFd;

/// Exit status of a process whose image replacement failed.
pub const EXEC_FAILURE_STATUS: i32 = 1;

/// A validated, non-empty argument vector ready for `execvp`.
///
/// `argv[0]` names the program; it is looked up through `PATH` when it has no
/// slash.
#[derive(Debug, Clone)]
pub struct ExecArgs {
    argv: Vec<CString>,
}

impl ExecArgs {
    /// Validate and convert `args`.
    ///
    /// Fails if the vector is empty, the program name is empty, or any argument
    /// contains a NUL byte.
    pub fn new<I, S>(args: I) -> ProcessResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let argv = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
                CString::new(arg).map_err(|e| {
                    ProcessError::invalid_arguments(format!(
                        "argument {} contains a NUL byte at offset {}",
                        i,
                        e.nul_position()
                    ))
                })
            })
            .collect::<ProcessResult<Vec<_>>>()?;

        match argv.first() {
            None => Err(ProcessError::invalid_arguments("argument vector is empty")),
            Some(program) if program.as_bytes().is_empty() => {
                Err(ProcessError::invalid_arguments("program name is empty"))
            }
            Some(_) => Ok(Self { argv }),
        }
    }

    /// The program to execute (`argv[0]`).
    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Replace the calling process's image.
    ///
    /// Only returns on failure.
    pub fn replace_image(&self) -> Result<Infallible, Errno> {
        execvp(self.program(), &self.argv)
    }

    /// Replace the calling process's image, or report and `_exit` with
    /// [`EXEC_FAILURE_STATUS`].
    pub fn exec(&self) -> ! {
        match self.replace_image() {
            Ok(never) => match never {},
            Err(errno) => fail_child(b"execvp failed", self.program().to_bytes(), errno),
        }
    }
}

/// Replace the calling process's image with `args`.
///
/// Never returns. If `args` is not a valid argument vector or the program
/// cannot be executed, a diagnostic goes to stderr and the process exits with
/// [`EXEC_FAILURE_STATUS`] without running destructors or exit handlers.
pub fn exec_process<S: AsRef<str>>(args: &[S]) -> ! {
    match ExecArgs::new(args.iter().map(|a| a.as_ref())) {
        Ok(exec_args) => exec_args.exec(),
        Err(e) => {
            eprintln!("exec failed: {}", e);
            _exit(EXEC_FAILURE_STATUS)
        }
    }
}

/// Terminate immediately with `code`, skipping destructors, `atexit` handlers
/// and stdio flushing.
pub(crate) fn _exit(code: i32) -> ! {
    // SAFETY: `_exit` is async-signal-safe and touches no Rust-managed state.
    unsafe { nix::libc::_exit(code) }
}

/// Write `"{what}: {subject}: {errno}\n"` to stderr and `_exit(1)`.
///
/// Safe between fork and exec: no allocation, no locks, raw `write` only.
pub(crate) fn fail_child(what: &[u8], subject: &[u8], errno: Errno) -> ! {
    let stderr = std::io::stderr();
    let fd = stderr.as_fd();
    let parts: [&[u8]; 6] = [
        what,
        b": ",
        subject,
        b": ",
        errno.desc().as_bytes(),
        b"\n",
    ];
    for part in parts {
        if part.is_empty() {
            continue;
        }
        let _ = write(fd, part);
    }
    _exit(EXEC_FAILURE_STATUS)
}
