// src/exec/signal.rs

//! Cooperative stop requests for child processes.

use std::io;

use tokio::process::Child;

/// Ask `child` to exit on its own.
///
/// On unix this sends `SIGTERM`. Elsewhere there is no portable cooperative
/// request, so the child is killed right away.
#[cfg(unix)]
pub fn request_graceful_stop(child: &mut Child) -> io::Result<()> {
    // `id()` is gone once the child has been reaped.
    let Some(pid) = child.id() else {
        return Ok(());
    };

    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
pub fn request_graceful_stop(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
