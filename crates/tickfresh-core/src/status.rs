//! Coarse market-movement classification for presentation code.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Bar, ValidationError};

const CRASH_PCT: f64 = -3.0;
const DOWN_PCT: f64 = -0.5;
const UP_PCT: f64 = 0.5;
const SURGE_PCT: f64 = 3.0;
const LONG_HORIZON_BARS: usize = 5;
const LONG_HORIZON_PCT: f64 = 5.0;

/// Movement category derived from recent price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    Surge,
    Up,
    Stable,
    Down,
    Crash,
    /// Price data that cannot be compared, such as a zero close.
    Abnormal,
    Unknown,
}

impl MarketStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Surge => "surge",
            Self::Up => "up",
            Self::Stable => "stable",
            Self::Down => "down",
            Self::Crash => "crash",
            Self::Abnormal => "abnormal",
            Self::Unknown => "unknown",
        }
    }

    /// Category for a percent change using the fixed thresholds.
    pub fn from_change(change_pct: f64) -> Self {
        if change_pct <= CRASH_PCT {
            Self::Crash
        } else if change_pct <= DOWN_PCT {
            Self::Down
        } else if change_pct >= SURGE_PCT {
            Self::Surge
        } else if change_pct >= UP_PCT {
            Self::Up
        } else {
            Self::Stable
        }
    }
}

impl Display for MarketStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "surge" => Ok(Self::Surge),
            "up" => Ok(Self::Up),
            "stable" => Ok(Self::Stable),
            "down" => Ok(Self::Down),
            "crash" => Ok(Self::Crash),
            "abnormal" => Ok(Self::Abnormal),
            "unknown" => Ok(Self::Unknown),
            other => Err(ValidationError::InvalidStatus {
                value: other.to_owned(),
            }),
        }
    }
}

/// Which bars are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Horizon {
    /// Last two bars, escalated by the change over the last five bars.
    #[default]
    Recent,
    /// First bar against last bar.
    Span,
}

/// Percent change from `from` to `to`; `None` when `from` is zero or either
/// value is not finite.
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 || !from.is_finite() || !to.is_finite() {
        return None;
    }
    Some((to - from) * 100.0 / from)
}

/// Classify a series. An override (demo mode) is returned unchanged.
pub fn classify(bars: &[Bar], horizon: Horizon, override_state: Option<MarketStatus>) -> MarketStatus {
    if let Some(state) = override_state {
        return state;
    }

    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return MarketStatus::Unknown;
    };
    if bars.len() < 2 {
        return MarketStatus::Unknown;
    }

    let reference = match horizon {
        Horizon::Recent => &bars[bars.len() - 2],
        Horizon::Span => first,
    };
    let Some(change) = percent_change(reference.close, last.close) else {
        return MarketStatus::Abnormal;
    };

    let status = MarketStatus::from_change(change);
    if horizon == Horizon::Span || status != MarketStatus::Stable {
        return status;
    }

    bars.len()
        .checked_sub(LONG_HORIZON_BARS + 1)
        .and_then(|index| percent_change(bars[index].close, last.close))
        .map(|long_change| {
            if long_change >= LONG_HORIZON_PCT {
                MarketStatus::Up
            } else if long_change <= -LONG_HORIZON_PCT {
                MarketStatus::Down
            } else {
                MarketStatus::Stable
            }
        })
        .unwrap_or(MarketStatus::Stable)
}
