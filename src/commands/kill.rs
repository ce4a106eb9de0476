//! `pbt kill` - stop every recorded emulator process

use pbt_core::prelude::*;
use pbt_emulator::{kill_all, KillSignal};

use super::Context;

/// Signal every recorded process; SIGKILL when `force`, SIGTERM otherwise.
///
/// Returns how many processes were signalled.
pub fn run(ctx: &Context, force: bool) -> Result<usize> {
    let signal = if force {
        KillSignal::Kill
    } else {
        KillSignal::Terminate
    };
    let instances = ctx.registry().load()?;
    let signalled = kill_all(&instances, signal)?;
    info!("Signalled {} emulator process(es)", signalled);
    Ok(signalled)
}
