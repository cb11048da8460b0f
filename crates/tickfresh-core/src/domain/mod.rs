//! # Domain Models
//!
//! Canonical types shared by every layer of the freshness engine.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bar`] | Validated OHLCV bar |
//! | [`BarSeries`] | Ordered bars for one symbol/interval |
//! | [`SeriesKey`] | Cache key (symbol + interval) |
//! | [`Symbol`] | Normalized ticker |
//! | [`Interval`] | Sampling granularity (1min .. monthly) |
//! | [`UtcDateTime`] | UTC wall-clock timestamp |
//!
//! Construction validates invariants, so a `Bar` in hand always satisfies
//! `low <= min(open, close) <= max(open, close) <= high`.

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub use models::{Bar, BarSeries, SeriesKey};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
