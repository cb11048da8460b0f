use std::sync::Arc;

use tickfresh_core::LogSink;

use crate::cli::ResolveArgs;
use crate::error::CliError;
use crate::output::Printer;

use super::{build_cache, parse_series, SeriesReport};

pub async fn run(args: &ResolveArgs, log: Arc<dyn LogSink>, printer: &Printer) -> Result<(), CliError> {
    let (symbol, interval, horizon) = parse_series(&args.series)?;
    let cache = build_cache(args.offline, log);

    let resolution = cache.resolve(&symbol, interval).await;
    printer.print(&SeriesReport::resolved(&resolution, horizon))
}
