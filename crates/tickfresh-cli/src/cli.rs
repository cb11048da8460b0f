//! CLI argument definitions for tickfresh.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resolve` | Resolve one series through the freshness cache |
//! | `watch` | Subscribe and print each scheduled refresh |
//! | `generate` | Print a synthetic series without touching the network |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--show-log` | `false` | Print dashboard log messages to stderr |
//!
//! # Examples
//!
//! ```bash
//! # Live 5-minute bars, falling back to demo data on failure
//! tickfresh resolve AAPL --interval 5min --pretty
//!
//! # Refresh every period until the data turns synthetic
//! tickfresh watch MSFT --interval 1min --ticks 3 --format table
//!
//! # Reproducible synthetic series
//! tickfresh generate NVDA --interval daily --seed 7
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Interval-aware price series with demo-data fallback.
#[derive(Debug, Parser)]
#[command(
    name = "tickfresh",
    author,
    version,
    about = "Interval-aware price series with demo-data fallback"
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Print the buffered dashboard log to stderr after the command.
    #[arg(long, global = true, default_value_t = false)]
    pub show_log: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table with the most recent bars.
    Table,
    /// One JSON object per result.
    Json,
}

/// Which bars the status compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HorizonArg {
    /// Last two bars.
    Recent,
    /// First against last bar.
    Span,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve one series (cached, live, or synthetic).
    ///
    /// # Examples
    ///
    ///   tickfresh resolve AAPL
    ///   tickfresh resolve AAPL --interval 1h --offline
    Resolve(ResolveArgs),

    /// Subscribe to a series and print every refresh.
    ///
    /// Stops when the subscription pauses or after --ticks updates.
    Watch(WatchArgs),

    /// Generate a synthetic series.
    Generate(GenerateArgs),
}

/// Symbol and interval shared by every command.
#[derive(Debug, Args)]
pub struct SeriesArgs {
    /// Market symbol (e.g., AAPL).
    pub symbol: String,

    /// Sampling interval.
    ///
    /// One of 1min, 5min, 15min, 30min, 60min, daily, weekly, monthly
    /// (aliases: 1m, 5m, 15m, 30m, 1h, 1d, 1w, 1mo).
    #[arg(long, default_value = "5min")]
    pub interval: String,

    /// Status horizon reported alongside the bars.
    #[arg(long, value_enum, default_value_t = HorizonArg::Recent)]
    pub horizon: HorizonArg,
}

/// Arguments for the `resolve` command.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Never touch the network; always serve demo data.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

/// Arguments for the `watch` command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Stop after this many updates.
    #[arg(long)]
    pub ticks: Option<usize>,

    /// Never touch the network; always serve demo data.
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

/// Arguments for the `generate` command.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub series: SeriesArgs,

    /// Seed for a reproducible series.
    #[arg(long)]
    pub seed: Option<u64>,
}
