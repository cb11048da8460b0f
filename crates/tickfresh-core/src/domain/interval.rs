use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Sampling granularity of a bar series.
///
/// The interval decides three things at once: the shape of the upstream
/// request, how long a cached series stays fresh, and how dense a synthetic
/// series is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "60min")]
    SixtyMinutes,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
}

impl Interval {
    pub const ALL: [Self; 8] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::SixtyMinutes,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::ThirtyMinutes => "30min",
            Self::SixtyMinutes => "60min",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub const fn is_intraday(self) -> bool {
        matches!(
            self,
            Self::OneMinute
                | Self::FiveMinutes
                | Self::FifteenMinutes
                | Self::ThirtyMinutes
                | Self::SixtyMinutes
        )
    }

    /// Upstream function name. Intraday granularities share one function.
    pub const fn upstream_function(self) -> &'static str {
        match self {
            Self::Daily => "TIME_SERIES_DAILY",
            Self::Weekly => "TIME_SERIES_WEEKLY",
            Self::Monthly => "TIME_SERIES_MONTHLY",
            _ => "TIME_SERIES_INTRADAY",
        }
    }

    /// Value of the upstream `interval` query parameter, intraday only.
    pub const fn upstream_interval(self) -> Option<&'static str> {
        if self.is_intraday() {
            Some(self.as_str())
        } else {
            None
        }
    }

    /// Key of the time-series object inside an upstream payload.
    pub const fn series_label(self) -> &'static str {
        match self {
            Self::OneMinute => "Time Series (1min)",
            Self::FiveMinutes => "Time Series (5min)",
            Self::FifteenMinutes => "Time Series (15min)",
            Self::ThirtyMinutes => "Time Series (30min)",
            Self::SixtyMinutes => "Time Series (60min)",
            Self::Daily => "Time Series (Daily)",
            Self::Weekly => "Weekly Time Series",
            Self::Monthly => "Monthly Time Series",
        }
    }

    /// Age after which a cached series for this interval is stale.
    pub const fn max_cache_age(self) -> Duration {
        match self {
            Self::OneMinute => Duration::from_secs(5 * 60),
            Self::FiveMinutes => Duration::from_secs(15 * 60),
            Self::FifteenMinutes | Self::ThirtyMinutes | Self::SixtyMinutes => HOUR,
            Self::Daily => DAY,
            Self::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
            Self::Monthly => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// Automatic refresh period. Long horizons are never auto-refreshed.
    pub const fn refresh_period(self) -> Option<Duration> {
        if self.is_intraday() {
            Some(self.max_cache_age())
        } else {
            None
        }
    }

    /// Wall-clock distance between two consecutive bars.
    pub const fn step(self) -> Duration {
        match self {
            Self::OneMinute => MINUTE,
            Self::FiveMinutes => Duration::from_secs(5 * 60),
            Self::FifteenMinutes => Duration::from_secs(15 * 60),
            Self::ThirtyMinutes => Duration::from_secs(30 * 60),
            Self::SixtyMinutes => HOUR,
            Self::Daily => DAY,
            Self::Weekly => Duration::from_secs(7 * 24 * 60 * 60),
            Self::Monthly => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// History covered by a synthetic series, in days.
    pub const fn history_days(self) -> u32 {
        match self {
            Self::OneMinute => 7,
            Self::FiveMinutes => 30,
            Self::FifteenMinutes => 60,
            Self::ThirtyMinutes => 90,
            Self::SixtyMinutes => 180,
            Self::Daily => 365,
            Self::Weekly => 3_650,
            Self::Monthly => 7_300,
        }
    }

    pub fn bars_per_day(self) -> f64 {
        DAY.as_secs_f64() / self.step().as_secs_f64()
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1min" | "1m" => Ok(Self::OneMinute),
            "5min" | "5m" => Ok(Self::FiveMinutes),
            "15min" | "15m" => Ok(Self::FifteenMinutes),
            "30min" | "30m" => Ok(Self::ThirtyMinutes),
            "60min" | "60m" | "1h" => Ok(Self::SixtyMinutes),
            "daily" | "1d" => Ok(Self::Daily),
            "weekly" | "1w" => Ok(Self::Weekly),
            "monthly" | "1mo" => Ok(Self::Monthly),
            other => Err(ValidationError::InvalidInterval {
                value: other.to_owned(),
            }),
        }
    }
}
