//! Descriptor table sanitization for freshly forked children.
//!
//! A forked child inherits every descriptor the parent had open: listening
//! sockets, log files, other children's channels. Before the child replaces its
//! image, everything from [`RESERVED_FD_WATERMARK`] up to the process ceiling is
//! closed except the one channel endpoint being handed over.
//!
//! Everything here only issues raw syscalls and never allocates, so it can run
//! between `fork` and `exec`.

use nix::libc::{rlim_t, RLIM_INFINITY};
use nix::sys::resource::{getrlimit, Resource};
use std::os::fd::RawFd;

/// Lowest descriptor that sanitization touches; 0, 1 and 2 stay open.
pub const RESERVED_FD_WATERMARK: RawFd = 3;

/// Ceiling used when the open-file limit cannot be queried or is unlimited.
pub const FALLBACK_FD_CEILING: RawFd = 1024;

/// One past the highest descriptor number this process may have open.
///
/// This is the soft `RLIMIT_NOFILE` value. An unlimited or unrepresentable
/// limit falls back to [`FALLBACK_FD_CEILING`] so the close loop stays bounded.
pub fn max_fd() -> RawFd {
    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((soft, _hard)) => ceiling_from_limit(soft),
        Err(_) => FALLBACK_FD_CEILING,
    }
}

fn ceiling_from_limit(soft: rlim_t) -> RawFd {
    if soft == RLIM_INFINITY {
        return FALLBACK_FD_CEILING;
    }
    RawFd::try_from(soft).unwrap_or(FALLBACK_FD_CEILING)
}

/// Close every descriptor in `RESERVED_FD_WATERMARK..max_fd()` except `keep`.
///
/// Errors from individual closes are ignored: most numbers in the range are
/// not open at all.
pub fn close_descriptors_except(keep: RawFd) {
    close_range_except(RESERVED_FD_WATERMARK, max_fd(), keep);
}

fn close_range_except(first: RawFd, ceiling: RawFd, keep: RawFd) {
    if keep >= first && keep < ceiling {
        close_span(first, keep);
        close_span(keep + 1, ceiling);
    } else {
        close_span(first, ceiling);
    }
}

/// Close `[first, end)`.
fn close_span(first: RawFd, end: RawFd) {
    if first >= end {
        return;
    }

    #[cfg(target_os = "linux")]
    {
        // SAFETY: close_range takes plain integers and touches nothing but the
        // descriptor table; it is async-signal-safe.
        let ret = unsafe {
            nix::libc::syscall(
                nix::libc::SYS_close_range,
                first as nix::libc::c_uint,
                (end - 1) as nix::libc::c_uint,
                0 as nix::libc::c_uint,
            )
        };
        if ret == 0 {
            return;
        }
    }

    for fd in first..end {
        let _ = nix::unistd::close(fd);
    }
}
