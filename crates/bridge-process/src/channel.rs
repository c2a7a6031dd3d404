//! Anonymous duplex channels between a parent and the child it spawns.
//!
//! The channel is a connected `AF_UNIX` stream socket pair. Both descriptors
//! are created close-on-exec so they never leak into programs spawned by other
//! threads; the spawner clears the flag on the child's end after the fork.

use bridge_common::{ProcessError, ProcessResult};
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use tracing::debug;

/// Two connected endpoints; `parent` stays here, `child` is handed across the fork.
#[derive(Debug)]
pub struct ChannelPair {
    pub parent: OwnedFd,
    pub child: OwnedFd,
}

/// Create a connected, bidirectional stream channel.
///
/// On failure nothing is left open.
pub fn create_channel() -> ProcessResult<ChannelPair> {
    let (parent, child) = new_socket_pair()?;
    debug!(
        "Created channel: parent fd={}, child fd={}",
        parent.as_raw_fd(),
        child.as_raw_fd()
    );
    Ok(ChannelPair { parent, child })
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos"
))]
fn new_socket_pair() -> ProcessResult<(OwnedFd, OwnedFd)> {
    socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::SOCK_CLOEXEC,
    )
    .map_err(ProcessError::channel_failed)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos"
)))]
fn new_socket_pair() -> ProcessResult<(OwnedFd, OwnedFd)> {
    let (parent, child) = socketpair(AddressFamily::Unix, SockType::Stream, None, SockFlag::empty())
        .map_err(ProcessError::channel_failed)?;
    set_cloexec(parent.as_raw_fd(), true)?;
    set_cloexec(child.as_raw_fd(), true)?;
    Ok((parent, child))
}

/// Set or clear `FD_CLOEXEC` on a descriptor.
///
/// Only `fcntl` is called, so this is safe to use between fork and exec.
pub fn set_cloexec(fd: RawFd, on: bool) -> ProcessResult<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFD).map_err(|e| ProcessError::descriptor_flags(fd, e))?;
    let mut flags = FdFlag::from_bits_truncate(flags);
    flags.set(FdFlag::FD_CLOEXEC, on);
    fcntl(fd, FcntlArg::F_SETFD(flags))
        .map(drop)
        .map_err(|e| ProcessError::descriptor_flags(fd, e))
}

/// Reconnect to a channel endpoint inherited across exec.
///
/// `arg` is the descriptor number as the parent rendered it into the child's
/// argument vector. The descriptor must be open and must be a socket; on
/// success the returned stream owns it and marks it close-on-exec again.
pub fn adopt_endpoint(arg: &str) -> ProcessResult<UnixStream> {
    let fd: RawFd = arg
        .trim()
        .parse()
        .map_err(|e| ProcessError::invalid_endpoint(arg, format!("not a descriptor number: {}", e)))?;
    if fd < 0 {
        return Err(ProcessError::invalid_endpoint(arg, "descriptor must be non-negative"));
    }

    fcntl(fd, FcntlArg::F_GETFD)
        .map_err(|e| ProcessError::invalid_endpoint(arg, format!("descriptor is not open: {}", e)))?;
    let kind = nix::sys::stat::fstat(fd)
        .map_err(|e| ProcessError::invalid_endpoint(arg, format!("fstat failed: {}", e)))?;
    if kind.st_mode & nix::libc::S_IFMT != nix::libc::S_IFSOCK {
        return Err(ProcessError::invalid_endpoint(arg, "descriptor is not a socket"));
    }

    set_cloexec(fd, true)?;
    // SAFETY: the descriptor was verified open above and was handed to this
    // process for exclusive use, so taking ownership cannot double-close.
    let owned = unsafe { OwnedFd::from_raw_fd(fd) };
    Ok(UnixStream::from(owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn is_cloexec(fd: RawFd) -> bool {
        let flags = fcntl(fd, FcntlArg::F_GETFD).unwrap();
        FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC)
    }

    #[test]
    fn test_channel_is_connected_both_ways() {
        let pair = create_channel().unwrap();
        assert_ne!(pair.parent.as_raw_fd(), pair.child.as_raw_fd());

        let mut parent = UnixStream::from(pair.parent);
        let mut child = UnixStream::from(pair.child);

        parent.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        child.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        child.write_all(b"pong").unwrap();
        parent.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_channel_is_close_on_exec() {
        let pair = create_channel().unwrap();
        assert!(is_cloexec(pair.parent.as_raw_fd()));
        assert!(is_cloexec(pair.child.as_raw_fd()));
    }

    #[test]
    fn test_set_cloexec_toggles() {
        let pair = create_channel().unwrap();
        let fd = pair.child.as_raw_fd();
        set_cloexec(fd, false).unwrap();
        assert!(!is_cloexec(fd));
        set_cloexec(fd, true).unwrap();
        assert!(is_cloexec(fd));
    }

    #[test]
    fn test_adopt_endpoint() {
        let pair = create_channel().unwrap();
        let mut parent = UnixStream::from(pair.parent);
        let raw = std::os::fd::IntoRawFd::into_raw_fd(pair.child);

        let mut adopted = adopt_endpoint(&raw.to_string()).unwrap();
        adopted.write_all(b"hi").unwrap();
        let mut buf = [0u8; 2];
        parent.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[test]
    fn test_adopt_endpoint_rejects_garbage() {
        let err = adopt_endpoint("abc").unwrap_err();
        assert!(matches!(err, ProcessError::InvalidEndpoint { .. }));

        let err = adopt_endpoint("-3").unwrap_err();
        assert!(matches!(err, ProcessError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_adopt_endpoint_rejects_non_socket() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let err = adopt_endpoint(&file.as_raw_fd().to_string()).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidEndpoint { .. }));
    }
}
