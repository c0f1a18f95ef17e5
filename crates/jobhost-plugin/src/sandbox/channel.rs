//! Private protocol channel of a sandbox process.
//!
//! A plugin shares the sandbox's file descriptors, so anything it prints
//! to fd 1 would land between protocol frames. [`claim_stdout`] runs
//! before any module is loaded: it keeps a duplicate of fd 1 for frames
//! and points fd 1 at stderr, where plugin output joins the sandbox log.

use std::io;

/// Writer the protocol owns after [`claim_stdout`].
#[cfg(unix)]
pub type ProtocolOut = std::fs::File;

/// Writer the protocol owns after [`claim_stdout`].
#[cfg(not(unix))]
pub type ProtocolOut = io::Stdout;

/// Takes fd 1 for the protocol and redirects later stdout writes to stderr.
#[cfg(unix)]
pub fn claim_stdout() -> io::Result<ProtocolOut> {
    use std::io::Write;
    use std::os::fd::AsFd;

    io::stdout().lock().flush()?;
    let protocol = io::stdout().as_fd().try_clone_to_owned()?;
    // SAFETY: both are the process's own standard descriptors and stay open;
    // dup2 only changes what fd 1 refers to.
    if unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(protocol.into())
}

/// Without `dup2` the protocol keeps stdout as is; frames are still
/// recognised only at the start of a line.
#[cfg(not(unix))]
pub fn claim_stdout() -> io::Result<ProtocolOut> {
    Ok(io::stdout())
}
