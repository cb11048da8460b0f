//! Tunable thresholds and upstream client settings.
//!
//! Defaults reproduce the dashboard's production thresholds.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::Interval;

/// Credential used when no API key is configured. A normal operating mode.
pub const DEMO_API_KEY: &str = "demo";

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Decision thresholds for [`FreshnessCache`](crate::FreshnessCache).
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessConfig {
    /// Minimum spacing between two fetch attempts for one key.
    pub min_fetch_spacing: Duration,
    /// Attempts after which a synthetic entry stops refetching.
    pub breaker_threshold: u32,
    /// Two timestamp deltas closer than this count as equal.
    pub demo_spacing_tolerance: Duration,
    /// Minimum series length for the regular-spacing check.
    pub demo_min_bars: usize,
    max_age_overrides: HashMap<Interval, Duration>,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            min_fetch_spacing: Duration::from_secs(5 * 60),
            breaker_threshold: 2,
            demo_spacing_tolerance: Duration::from_millis(100),
            demo_min_bars: 3,
            max_age_overrides: HashMap::new(),
        }
    }
}

impl FreshnessConfig {
    pub fn with_min_fetch_spacing(mut self, spacing: Duration) -> Self {
        self.min_fetch_spacing = spacing;
        self
    }

    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold.max(1);
        self
    }

    pub fn with_max_age(mut self, interval: Interval, max_age: Duration) -> Self {
        self.max_age_overrides.insert(interval, max_age);
        self
    }

    pub fn max_age(&self, interval: Interval) -> Duration {
        self.max_age_overrides
            .get(&interval)
            .copied()
            .unwrap_or_else(|| interval.max_cache_age())
    }

    /// Timer period for scheduled refreshes. Only intraday intervals refresh,
    /// on the same cadence as their cache max age.
    pub fn refresh_period(&self, interval: Interval) -> Option<Duration> {
        interval.is_intraday().then(|| self.max_age(interval))
    }
}

/// Upstream connection settings for [`AlphaVantageClient`](crate::AlphaVantageClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::from(DEMO_API_KEY),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout: Duration::from_secs(10),
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
        }
    }
}

impl ClientConfig {
    /// Read the API key from `TICKFRESH_ALPHAVANTAGE_API_KEY`, falling back
    /// to `ALPHAVANTAGE_API_KEY`, then to the demo credential.
    pub fn from_env() -> Self {
        let api_key = env::var("TICKFRESH_ALPHAVANTAGE_API_KEY")
            .or_else(|_| env::var("ALPHAVANTAGE_API_KEY"))
            .ok()
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| String::from(DEMO_API_KEY));

        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_quota(mut self, window: Duration, limit: u32) -> Self {
        self.quota_window = window;
        self.quota_limit = limit;
        self
    }

    pub fn is_demo_key(&self) -> bool {
        self.api_key == DEMO_API_KEY
    }
}

/// Shape parameters for [`SeriesGenerator`](crate::SeriesGenerator).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// Per-step noise amplitude as a fraction of price.
    pub volatility: f64,
    /// Hard upper bound on generated bars.
    pub max_bars: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            volatility: 0.02,
            max_bars: 5_000,
        }
    }
}
