mod generate;
mod resolve;
mod watch;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tickfresh_core::{
    classify, percent_change, Bar, BarSeries, FreshnessCache, Horizon, Interval, LogSink,
    MarketStatus, RefreshState, Resolution, ResolveOutcome, Symbol,
};

use crate::cli::{Cli, Command, HorizonArg, SeriesArgs};
use crate::error::CliError;
use crate::output;

/// One printable result: a series plus how it was obtained.
#[derive(Debug, Serialize)]
pub struct SeriesReport<'a> {
    pub symbol: &'a str,
    pub interval: Interval,
    pub outcome: Option<ResolveOutcome>,
    pub is_synthetic: bool,
    pub retry_count: u32,
    pub failure: Option<&'static str>,
    pub state: Option<RefreshState>,
    pub status: MarketStatus,
    pub change_pct: Option<f64>,
    pub bars: &'a [Bar],
}

impl<'a> SeriesReport<'a> {
    pub fn synthetic(series: &'a BarSeries, horizon: Horizon) -> Self {
        Self {
            symbol: series.symbol.as_str(),
            interval: series.interval,
            outcome: None,
            is_synthetic: true,
            retry_count: 0,
            failure: None,
            state: None,
            status: classify(&series.bars, horizon, None),
            change_pct: change_pct(&series.bars, horizon),
            bars: &series.bars,
        }
    }

    pub fn resolved(resolution: &'a Resolution, horizon: Horizon) -> Self {
        let series = resolution.series.as_ref();
        Self {
            symbol: series.symbol.as_str(),
            interval: series.interval,
            outcome: Some(resolution.outcome),
            is_synthetic: resolution.is_synthetic,
            retry_count: resolution.retry_count,
            failure: resolution.failure.as_ref().map(|failure| failure.code()),
            state: None,
            status: classify(&series.bars, horizon, None),
            change_pct: change_pct(&series.bars, horizon),
            bars: &series.bars,
        }
    }

    pub fn with_state(mut self, state: RefreshState) -> Self {
        self.state = Some(state);
        self
    }
}

fn change_pct(bars: &[Bar], horizon: Horizon) -> Option<f64> {
    let (from, to) = match horizon {
        Horizon::Recent => (bars.iter().rev().nth(1)?, bars.last()?),
        Horizon::Span => (bars.first()?, bars.last()?),
    };
    percent_change(from.close, to.close)
}

pub async fn run(cli: &Cli, log: Arc<dyn LogSink>) -> Result<(), CliError> {
    let printer = output::Printer::new(cli.format, cli.pretty);
    match &cli.command {
        Command::Resolve(args) => resolve::run(args, log, &printer).await,
        Command::Watch(args) => watch::run(args, log, &printer).await,
        Command::Generate(args) => generate::run(args, &printer),
    }
}

fn parse_series(args: &SeriesArgs) -> Result<(Symbol, Interval, Horizon), CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let interval = Interval::from_str(&args.interval)?;
    let horizon = match args.horizon {
        HorizonArg::Recent => Horizon::Recent,
        HorizonArg::Span => Horizon::Span,
    };
    Ok((symbol, interval, horizon))
}

fn build_cache(offline: bool, log: Arc<dyn LogSink>) -> Arc<FreshnessCache> {
    let builder = FreshnessCache::builder().with_log_sink(log);
    if offline {
        builder.with_offline_mode().build()
    } else {
        builder.with_real_client().build()
    }
}
