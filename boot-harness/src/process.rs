//! Child process termination
//!
//! The emulator is usually a grandchild (`make` -> `qemu`), so on unix the
//! child is started as a process group leader and signals go to the whole
//! group.

use std::time::Duration;

use tokio::process::{Child, Command};

/// How a child ended up stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The child had already exited before we asked
    AlreadyExited,
    /// The child exited within the grace period after SIGTERM
    Graceful,
    /// The child ignored SIGTERM and had to be killed
    Forced,
}

/// Make the spawned child the leader of a fresh process group
pub fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd.kill_on_drop(true);
}

/// Stop `child`: graceful request first, forced kill after `grace`.
///
/// Never waits longer than twice the grace period.
pub async fn terminate(child: &mut Child, grace: Duration) -> Termination {
    let pid = child.id();

    if matches!(child.try_wait(), Ok(Some(_))) {
        sweep_group(pid);
        return Termination::AlreadyExited;
    }

    request_stop(child, pid);

    if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
        tracing::debug!(?pid, %status, "Child exited after stop request");
        sweep_group(pid);
        return Termination::Graceful;
    }

    sweep_group(pid);
    if let Err(e) = child.start_kill() {
        tracing::debug!(?pid, error = %e, "start_kill failed");
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        tracing::warn!(?pid, "Child still not reaped after forced kill");
    }
    Termination::Forced
}

#[cfg(unix)]
fn request_stop(_child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child, _pid: Option<u32>) {
    // No SIGTERM equivalent; the grace wait just gives the child a last chance
    let _ = child.start_kill();
}

/// Kill whatever is left in the child's group once the leader is gone
#[cfg(unix)]
fn sweep_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn sweep_group(_pid: Option<u32>) {}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Negative pid addresses the whole process group; ESRCH just means it is gone
    let _ = unsafe { libc::kill(-pgid, signal) };
}
