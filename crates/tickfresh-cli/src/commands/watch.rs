use std::sync::Arc;

use tickfresh_core::{LogSink, RefreshScheduler};
use tracing::debug;

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::Printer;

use super::{build_cache, parse_series, SeriesReport};

pub async fn run(args: &WatchArgs, log: Arc<dyn LogSink>, printer: &Printer) -> Result<(), CliError> {
    if args.ticks == Some(0) {
        return Err(CliError::Command(String::from(
            "--ticks must be greater than zero",
        )));
    }

    let (symbol, interval, horizon) = parse_series(&args.series)?;
    let scheduler = RefreshScheduler::new(build_cache(args.offline, log));
    let mut subscription = scheduler.subscribe(symbol, interval);

    let mut printed = 0_usize;
    loop {
        let update = tokio::select! {
            update = subscription.next_update() => update,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(update) = update else {
            debug!("watch loop finished");
            break;
        };
        debug!(key = %update.key, state = ?update.state, "refresh update received");

        printer.print(&SeriesReport::resolved(&update.resolution, horizon).with_state(update.state))?;
        printed += 1;
        if args.ticks.is_some_and(|ticks| printed >= ticks) {
            break;
        }
    }

    subscription.unsubscribe();
    Ok(())
}
