//! `pbt status` - report every recorded emulator

use pbt_core::prelude::*;
use pbt_emulator::{render_report, LocalhostConnector, ProjectDir, SignalProbe, StatusAggregator};

use super::Context;

/// Build the status report for every instance in the registry.
pub async fn report(ctx: &Context, verbose: bool) -> Result<String> {
    let aggregator = StatusAggregator::new(
        ctx.registry(),
        SignalProbe,
        LocalhostConnector,
        ProjectDir(ctx.cwd.clone()),
    );
    let statuses = aggregator.compute_status().await?;
    debug!("Computed status of {} emulator(s)", statuses.len());
    Ok(render_report(&statuses, verbose))
}

/// Run the status command.
pub async fn run(ctx: &Context, verbose: bool) -> Result<()> {
    let report = report(ctx, verbose).await?;
    println!("{report}");
    Ok(())
}
