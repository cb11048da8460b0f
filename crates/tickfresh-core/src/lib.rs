//! # Tickfresh Core
//!
//! Interval-aware fetch, cache and fallback engine for dashboard price
//! series.
//!
//! ## Overview
//!
//! Given a ticker and a sampling interval, the engine always produces an
//! ordered bar series:
//!
//! - **Live data** from Alpha Vantage when the upstream answers in time
//! - **Cached data** while the entry is fresh or the fetch spacing is active
//! - **Synthetic data** when the upstream fails, rate-limits or looks generated
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Per-key fetch/serve/synthesize decisions |
//! | [`config`] | Thresholds, credentials, generator tuning |
//! | [`domain`] | Domain models (Symbol, Interval, Bar, BarSeries) |
//! | [`error`] | Core error types |
//! | [`fetch`] | Upstream client and failure taxonomy |
//! | [`generator`] | Synthetic series generation |
//! | [`http_client`] | HTTP client abstraction |
//! | [`log`] | Dashboard log side channel |
//! | [`payload`] | Upstream payload classification and normalization |
//! | [`scheduler`] | Timer-driven subscription refresh |
//! | [`status`] | Market movement classification |
//! | [`throttling`] | Local request quota |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickfresh_core::{classify, FreshnessCache, Horizon, Interval, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = FreshnessCache::builder().with_real_client().build();
//!
//!     let symbol = Symbol::parse("AAPL")?;
//!     let resolution = cache.resolve(&symbol, Interval::FiveMinutes).await;
//!
//!     let status = classify(&resolution.series.bars, Horizon::Recent, None);
//!     println!("{} bars, demo={}, {status}", resolution.series.len(), resolution.is_synthetic);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ RefreshScheduler │
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ FreshnessCache   │────▶│ SeriesGenerator  │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ AlphaVantage     │────▶│ HTTP Client      │
//! │ Client           │     │ (reqwest/none)   │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │ Payload          │
//! │ Normalizer       │
//! └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! `FreshnessCache::resolve` never fails. Upstream problems surface as a
//! synthetic series plus the typed failure that caused it:
//!
//! ```rust
//! use tickfresh_core::{FetchFailure, Resolution};
//!
//! fn describe(resolution: &Resolution) -> &'static str {
//!     match &resolution.failure {
//!         Some(FetchFailure::RateLimited(_)) => "upstream quota reached",
//!         Some(FetchFailure::Timeout { .. }) => "upstream too slow",
//!         Some(_) => "upstream unavailable",
//!         None if resolution.is_synthetic => "demo data",
//!         None => "live data",
//!     }
//! }
//! ```

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod generator;
pub mod http_client;
pub mod log;
pub mod payload;
pub mod scheduler;
pub mod status;
pub mod throttling;

// Freshness engine
pub use cache::{
    has_uniform_spacing, CacheEntry, EngineBuilder, FreshnessCache, Resolution, ResolveOutcome,
    SeriesView,
};

// Configuration
pub use config::{ClientConfig, FreshnessConfig, GeneratorConfig};

// Domain models
pub use domain::{Bar, BarSeries, Interval, SeriesKey, Symbol, UtcDateTime};

// Error types
pub use error::ValidationError;

// Upstream client
pub use fetch::{AlphaVantageClient, BarFetcher, FetchFailure};

// Synthetic data
pub use generator::{generate_series, RandomSource, SeriesGenerator, SeriesSynthesizer, TrendMode};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};

// Log side channel
pub use log::{BufferedLogSink, LogEmitter, LogLevel, LogMessage, LogSink};

// Payload parsing
pub use payload::{classify_payload, normalize, try_normalize, NormalizeError, UpstreamPayload};

// Refresh scheduling
pub use scheduler::{refresh_state, RefreshScheduler, RefreshState, RefreshUpdate, Subscription};

// Status classification
pub use status::{classify, percent_change, Horizon, MarketStatus};

// Throttling
pub use throttling::RequestThrottle;
