//! Process liveness, reaping and group signalling.
//!
//! Agents run in their own process group (pgid == pid), so stopping an agent
//! signals the whole group and reaches any tools it launched.

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
    use nix::unistd::Pid;
    use tracing::debug;

    fn pid_of(pid: u32) -> Option<Pid> {
        i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
    }

    /// Whether a process with this pid exists. A permission error means it
    /// exists but belongs to someone else.
    pub fn is_alive(pid: u32) -> bool {
        let Some(pid) = pid_of(pid) else {
            return false;
        };
        match kill(pid, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    /// Collect the exit status of our own child without blocking.
    ///
    /// Returns the exit code (128 + signal for signalled children) once the
    /// child has exited; `None` while it runs or when it is not our child.
    pub fn reap(pid: u32) -> Option<i32> {
        let pid = pid_of(pid)?;
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => Some(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => Some(128 + signal as i32),
            Ok(_) => None,
            Err(Errno::ECHILD) => None,
            Err(e) => {
                debug!(pid = pid.as_raw(), error = %e, "waitpid failed");
                None
            }
        }
    }

    fn signal_group(pid: u32, signal: Signal) -> bool {
        let Some(pid) = pid_of(pid) else {
            return false;
        };
        match killpg(pid, signal) {
            Ok(()) => true,
            // Group already gone, or the child never made it into its own
            // group: fall back to the single process.
            Err(Errno::ESRCH) => kill(pid, signal).is_ok(),
            Err(e) => {
                debug!(pid = pid.as_raw(), ?signal, error = %e, "killpg failed");
                false
            }
        }
    }

    /// Ask the agent's process group to terminate.
    pub fn terminate_group(pid: u32) -> bool {
        signal_group(pid, Signal::SIGTERM)
    }

    /// Force-kill the agent's process group.
    pub fn kill_group(pid: u32) -> bool {
        signal_group(pid, Signal::SIGKILL)
    }
}

#[cfg(not(unix))]
mod imp {
    pub const fn is_alive(_pid: u32) -> bool {
        false
    }

    pub const fn reap(_pid: u32) -> Option<i32> {
        None
    }

    pub const fn terminate_group(_pid: u32) -> bool {
        false
    }

    pub const fn kill_group(_pid: u32) -> bool {
        false
    }
}

pub use imp::{is_alive, kill_group, reap, terminate_group};
