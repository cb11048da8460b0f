//! Synthetic bar series used when live data is unavailable.
//!
//! A series is a random walk around a per-symbol base price: a cumulative
//! drift factor moves once per simulated day in the direction of a randomly
//! chosen trend, each bar adds bounded noise, and volume spikes on large
//! moves. Output is random but always satisfies the [`Bar`] invariants and
//! the configured bar cap.

use std::sync::Mutex;

use time::Duration;

use crate::config::GeneratorConfig;
use crate::{Bar, BarSeries, Interval, Symbol, UtcDateTime};

const FALLBACK_BASE_PRICE: f64 = 100.0;
const DAILY_DRIFT: f64 = 0.005;
const TREND_WEIGHT: f64 = 0.05;
const RANGE_WIDTH: f64 = 0.01;
const MIN_PRICE: f64 = 0.01;
const VOLUME_FLOOR: f64 = 100_000.0;
const VOLUME_SPAN: f64 = 900_000.0;
const LARGE_MOVE: f64 = 0.01;
const SECONDS_PER_DAY: u64 = 86_400;

const BASE_PRICES: [(&str, f64); 10] = [
    ("AAPL", 175.0),
    ("MSFT", 380.0),
    ("GOOGL", 140.0),
    ("AMZN", 145.0),
    ("TSLA", 240.0),
    ("META", 330.0),
    ("NVDA", 480.0),
    ("NFLX", 450.0),
    ("IBM", 150.0),
    ("JPM", 155.0),
];

/// Uniform random numbers in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;
}

impl RandomSource for fastrand::Rng {
    fn next_f64(&mut self) -> f64 {
        self.f64()
    }
}

/// Producer of stand-in series, called by the cache on every fallback.
pub trait SeriesSynthesizer: Send + Sync {
    fn synthesize(&self, symbol: &Symbol, interval: Interval) -> BarSeries;
}

/// Overall direction of a synthetic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMode {
    Up,
    Down,
    Mixed,
}

impl TrendMode {
    pub fn pick(rng: &mut dyn RandomSource) -> Self {
        match (rng.next_f64() * 3.0) as u8 {
            0 => Self::Up,
            1 => Self::Down,
            _ => Self::Mixed,
        }
    }

    const fn sign(self) -> f64 {
        match self {
            Self::Up => 1.0,
            Self::Down => -1.0,
            Self::Mixed => 0.0,
        }
    }

    // The walk runs from now into the past, so an uptrend shrinks the factor.
    fn daily_nudge(self, rng: &mut dyn RandomSource) -> f64 {
        let magnitude = DAILY_DRIFT * rng.next_f64();
        match self {
            Self::Up => -magnitude,
            Self::Down => magnitude,
            Self::Mixed => {
                if rng.next_f64() < 0.5 {
                    -magnitude
                } else {
                    magnitude
                }
            }
        }
    }
}

/// Starting price for a ticker; unknown tickers share one fallback.
pub fn base_price(symbol: &Symbol) -> f64 {
    BASE_PRICES
        .iter()
        .find(|(ticker, _)| *ticker == symbol.as_str())
        .map(|(_, price)| *price)
        .unwrap_or(FALLBACK_BASE_PRICE)
}

/// Number of bars generated for `interval`: history span times density,
/// never more than `max_bars`.
pub fn bar_count(interval: Interval, max_bars: usize) -> usize {
    let wanted = (f64::from(interval.history_days()) * interval.bars_per_day()).floor() as usize;
    wanted.min(max_bars)
}

/// Generate a series ending at `now`.
pub fn generate_series(
    symbol: &Symbol,
    interval: Interval,
    now: UtcDateTime,
    config: &GeneratorConfig,
    rng: &mut dyn RandomSource,
) -> BarSeries {
    let count = bar_count(interval, config.max_bars);
    let trend = TrendMode::pick(rng);
    let base = base_price(symbol);
    let step_secs = interval.step().as_secs();

    let mut factor = 1.0_f64;
    let mut current_day = None;
    let mut newer_close: Option<f64> = None;
    let mut bars = Vec::with_capacity(count);

    for index in 0..count {
        let elapsed_secs = step_secs.saturating_mul(index as u64);
        let day = elapsed_secs / SECONDS_PER_DAY;
        if current_day != Some(day) {
            current_day = Some(day);
            factor = (factor * (1.0 + trend.daily_nudge(rng))).clamp(0.2, 5.0);
        }

        let progress = 1.0 - index as f64 / count as f64;
        let noise = (rng.next_f64() * 2.0 - 1.0) * config.volatility;
        let price =
            (base * factor * (1.0 + noise + trend.sign() * TREND_WEIGHT * progress)).max(MIN_PRICE);

        let high = price * (1.0 + rng.next_f64() * RANGE_WIDTH);
        let low = price * (1.0 - rng.next_f64() * RANGE_WIDTH);
        let open = (low + rng.next_f64() * (high - low)).clamp(low, high);
        let close = (low + rng.next_f64() * (high - low)).clamp(low, high);

        let mut volume = VOLUME_FLOOR + rng.next_f64() * VOLUME_SPAN;
        let step_move = newer_close
            .map(|newer| ((newer - close) / close).abs())
            .unwrap_or(0.0);
        if step_move > LARGE_MOVE {
            volume *= (1.0 + step_move * 50.0).min(3.0);
        }

        let offset = Duration::seconds(i64::try_from(elapsed_secs).unwrap_or(i64::MAX));
        bars.push(Bar {
            ts: now.saturating_sub(offset),
            open,
            high,
            low,
            close,
            volume: volume.round() as u64,
        });
        newer_close = Some(close);
    }

    bars.reverse();
    bars.sort_by(|left, right| left.ts.cmp(&right.ts));
    BarSeries::new(symbol.clone(), interval, bars)
}

/// Default [`SeriesSynthesizer`] backed by an injected random source.
pub struct SeriesGenerator {
    config: GeneratorConfig,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl SeriesGenerator {
    pub fn new() -> Self {
        Self::with_source(Box::new(fastrand::Rng::new()))
    }

    /// Reproducible random stream; timestamps still follow the wall clock.
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(Box::new(fastrand::Rng::with_seed(seed)))
    }

    pub fn with_source(source: Box<dyn RandomSource>) -> Self {
        Self {
            config: GeneratorConfig::default(),
            rng: Mutex::new(source),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate(&self, symbol: &Symbol, interval: Interval) -> BarSeries {
        let mut rng = self.rng.lock().expect("generator rng lock is not poisoned");
        let series = generate_series(
            symbol,
            interval,
            UtcDateTime::now(),
            &self.config,
            &mut **rng,
        );
        tracing::debug!(%symbol, %interval, bars = series.len(), "generated synthetic series");
        series
    }
}

impl Default for SeriesGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesSynthesizer for SeriesGenerator {
    fn synthesize(&self, symbol: &Symbol, interval: Interval) -> BarSeries {
        self.generate(symbol, interval)
    }
}

impl std::fmt::Debug for SeriesGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
