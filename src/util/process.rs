//! Process signalling and liveness probes by raw pid.
//!
//! Pid probing is racy (pids are reused), so these answers are advisory only.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Outcome of signalling a pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDelivery {
    /// The signal was delivered.
    Sent,
    /// No such process; treated as already stopped.
    Gone,
    /// The process exists but belongs to someone else.
    Denied,
}

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

/// Whether a process with this pid currently exists.
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    let Some(pid) = to_pid(pid) else {
        return false;
    };
    match signal::kill(pid, None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Send `sig` to `pid`.
#[must_use]
pub fn send_signal(pid: u32, sig: Signal) -> SignalDelivery {
    let Some(target) = to_pid(pid) else {
        return SignalDelivery::Gone;
    };
    match signal::kill(target, sig) {
        Ok(()) => SignalDelivery::Sent,
        Err(Errno::EPERM) => SignalDelivery::Denied,
        Err(_) => SignalDelivery::Gone,
    }
}

/// Graceful termination request (SIGTERM).
#[must_use]
pub fn terminate(pid: u32) -> SignalDelivery {
    send_signal(pid, Signal::SIGTERM)
}

/// Forceful kill (SIGKILL).
#[must_use]
pub fn kill(pid: u32) -> SignalDelivery {
    send_signal(pid, Signal::SIGKILL)
}

/// SIGKILL every process in the group led by `pgid`.
#[must_use]
pub fn kill_group(pgid: u32) -> SignalDelivery {
    let Some(target) = to_pid(pgid) else {
        return SignalDelivery::Gone;
    };
    match signal::killpg(target, Signal::SIGKILL) {
        Ok(()) => SignalDelivery::Sent,
        Err(Errno::EPERM) => SignalDelivery::Denied,
        Err(_) => SignalDelivery::Gone,
    }
}
