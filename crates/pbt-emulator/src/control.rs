//! Stopping recorded emulator processes.

use pbt_core::prelude::*;

use crate::liveness::{terminate, KillSignal};
use crate::registry::EmulatorInstance;

/// Send `signal` to every recorded process of every instance.
///
/// Processes that have already exited are skipped. Returns how many
/// processes were signalled.
///
/// # Errors
///
/// Stops at the first signal failure other than "no such process".
pub fn kill_all(instances: &[EmulatorInstance], signal: KillSignal) -> Result<usize> {
    let mut signalled = 0;
    for instance in instances {
        for pid in instance.pids() {
            if terminate(pid, signal)? {
                info!("Sent {:?} to {} process {}", signal, instance.key, pid);
                signalled += 1;
            }
        }
    }
    Ok(signalled)
}
