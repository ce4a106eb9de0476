//! Process liveness probing and signalling.

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use pbt_core::prelude::*;

/// Answers whether a recorded pid still refers to a live process.
pub trait ProcessProbe {
    /// # Errors
    ///
    /// A missing process is `Ok(false)`. Any other failure means the probe
    /// itself is broken and is returned as [`Error::ProcessProbe`].
    fn is_alive(&self, pid: u32) -> Result<bool>;
}

/// Probes with a null signal, which checks the pid without touching the
/// process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: u32) -> Result<bool> {
        let Some(target) = to_pid(pid) else {
            return Ok(false);
        };
        interpret_probe(pid, signal::kill(target, None))
    }
}

/// Probe `pid` with a [`SignalProbe`].
pub fn is_alive(pid: u32) -> Result<bool> {
    SignalProbe.is_alive(pid)
}

fn interpret_probe(pid: u32, outcome: nix::Result<()>) -> Result<bool> {
    match outcome {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(Error::process_probe(pid, errno.desc())),
    }
}

/// Signal sent by [`terminate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillSignal {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

impl KillSignal {
    fn as_nix(self) -> Signal {
        match self {
            KillSignal::Terminate => Signal::SIGTERM,
            KillSignal::Kill => Signal::SIGKILL,
        }
    }
}

/// Send `sig` to `pid`. Returns `false` if there was no such process.
pub fn terminate(pid: u32, sig: KillSignal) -> Result<bool> {
    let Some(target) = to_pid(pid) else {
        return Ok(false);
    };
    match signal::kill(target, sig.as_nix()) {
        Ok(()) => {
            debug!("Sent {:?} to pid {}", sig, pid);
            Ok(true)
        }
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(Error::process_probe(pid, errno.desc())),
    }
}

/// Pids that would address a process group or overflow are never probed.
fn to_pid(pid: u32) -> Option<Pid> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_is_alive() {
        assert!(is_alive(std::process::id()).unwrap());
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_alive(pid).unwrap());
    }

    #[test]
    fn test_zero_and_overflowing_pids_are_not_alive() {
        assert!(!is_alive(0).unwrap());
        assert!(!is_alive(u32::MAX).unwrap());
    }

    #[test]
    fn test_missing_process_is_false() {
        assert!(!interpret_probe(123, Err(Errno::ESRCH)).unwrap());
    }

    #[test]
    fn test_other_probe_errors_propagate() {
        let err = interpret_probe(1, Err(Errno::EPERM)).unwrap_err();
        assert!(matches!(err, Error::ProcessProbe { pid: 1, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_terminate_missing_process_is_false() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!terminate(pid, KillSignal::Terminate).unwrap());
    }

    #[test]
    fn test_terminate_live_child() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        assert!(terminate(child.id(), KillSignal::Kill).unwrap());
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
