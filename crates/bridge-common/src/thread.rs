//! Thread identification strings for log correlation.

/// Build `{exe_name}-{pid}/{thread name}-{tid}` for the calling thread.
///
/// A missing label or an unnamed thread renders as an empty component. The
/// output is meant for humans reading logs; nothing parses it.
pub fn thread_name(exe_name: Option<&str>) -> String {
    format!(
        "{}-{}/{}-{}",
        exe_name.unwrap_or(""),
        std::process::id(),
        os_thread_name(),
        os_thread_id()
    )
}

/// Name the kernel has for the calling thread, as set by `pthread_setname_np`.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub fn os_thread_name() -> String {
    use std::ffi::CStr;

    let mut buf = [0 as nix::libc::c_char; 64];
    // SAFETY: buf is writable for buf.len() bytes.
    let ret = unsafe {
        nix::libc::pthread_getname_np(nix::libc::pthread_self(), buf.as_mut_ptr(), buf.len())
    };
    if ret != 0 {
        return String::new();
    }
    // SAFETY: on success buf holds a NUL-terminated string.
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn os_thread_name() -> String {
    std::thread::current().name().unwrap_or("").to_string()
}

/// Numeric kernel thread id of the calling thread.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn os_thread_id() -> u64 {
    nix::unistd::gettid().as_raw() as u64
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub fn os_thread_id() -> u64 {
    let mut tid: u64 = 0;
    // SAFETY: a null thread handle means the calling thread; tid is a valid out-pointer.
    unsafe {
        nix::libc::pthread_threadid_np(0, &mut tid);
    }
    tid
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
pub fn os_thread_id() -> u64 {
    0
}
