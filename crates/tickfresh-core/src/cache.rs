//! Per-key freshness decisions: serve cached, fetch, or synthesize.
//!
//! [`FreshnessCache`] is the single authority for which series a dashboard
//! should show for a `(symbol, interval)` pair. Every resolve ends in a
//! displayable series; upstream failures are absorbed by falling back to a
//! synthetic series that is flagged as such.
//!
//! Decision order for one key:
//!
//! 1. the caller's key changed since its previous request: fetch, with the
//!    retry count reset;
//! 2. the entry is synthetic and `breaker_threshold` attempts failed: serve;
//! 3. the last attempt is younger than `min_fetch_spacing`: serve;
//! 4. the series is younger than the interval's max age: serve;
//! 5. otherwise fetch.
//!
//! Access is serialized per key, so at most one upstream request per key is
//! in flight and a waiting caller serves the result it waited for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{ClientConfig, FreshnessConfig, GeneratorConfig};
use crate::fetch::{AlphaVantageClient, BarFetcher, FetchFailure};
use crate::generator::{SeriesGenerator, SeriesSynthesizer};
use crate::log::{LogEmitter, LogSink};
use crate::{Bar, BarSeries, Interval, SeriesKey, Symbol};

/// Stored state for one key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub series: Arc<BarSeries>,
    pub fetched_at: Instant,
    pub is_synthetic: bool,
    /// Attempts since the last real success or key change.
    pub retry_count: u32,
    pub last_attempt_at: Instant,
}

/// How a resolve produced its series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Served the stored series without an upstream attempt.
    Cached,
    /// Upstream attempt succeeded.
    Fetched,
    /// Upstream attempt failed and a synthetic series was stored.
    Synthesized,
}

/// Result of [`FreshnessCache::resolve`]. Always carries a series.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub series: Arc<BarSeries>,
    pub is_synthetic: bool,
    pub retry_count: u32,
    pub fetched_at: Instant,
    pub outcome: ResolveOutcome,
    /// Upstream failure behind a `Synthesized` outcome.
    pub failure: Option<FetchFailure>,
}

impl Resolution {
    fn cached(entry: &CacheEntry) -> Self {
        Self {
            series: Arc::clone(&entry.series),
            is_synthetic: entry.is_synthetic,
            retry_count: entry.retry_count,
            fetched_at: entry.fetched_at,
            outcome: ResolveOutcome::Cached,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchReason {
    NoEntry,
    KeyChanged,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeReason {
    Coalesced,
    BreakerOpen,
    Spacing,
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Fetch(FetchReason),
    Serve(ServeReason),
}

fn decide(
    entry: Option<&CacheEntry>,
    key_changed: bool,
    coalesced: bool,
    now: Instant,
    config: &FreshnessConfig,
    interval: Interval,
) -> Decision {
    let Some(entry) = entry else {
        return Decision::Fetch(FetchReason::NoEntry);
    };

    if coalesced {
        return Decision::Serve(ServeReason::Coalesced);
    }
    if key_changed {
        return Decision::Fetch(FetchReason::KeyChanged);
    }
    if entry.is_synthetic && entry.retry_count >= config.breaker_threshold {
        return Decision::Serve(ServeReason::BreakerOpen);
    }
    if now.saturating_duration_since(entry.last_attempt_at) < config.min_fetch_spacing {
        return Decision::Serve(ServeReason::Spacing);
    }
    if now.saturating_duration_since(entry.fetched_at) < config.max_age(interval) {
        return Decision::Serve(ServeReason::Fresh);
    }
    Decision::Fetch(FetchReason::Stale)
}

/// True when at least `min_bars` bars are spaced evenly within `tolerance`.
///
/// Live intraday and daily feeds have session and weekend gaps, so perfectly
/// regular spacing marks a series as generated.
pub fn has_uniform_spacing(bars: &[Bar], min_bars: usize, tolerance: Duration) -> bool {
    if bars.len() < min_bars.max(2) {
        return false;
    }

    let first = bars[1].ts.since(bars[0].ts);
    bars.windows(2)
        .all(|pair| (pair[1].ts.since(pair[0].ts) - first).unsigned_abs() <= tolerance)
}

#[derive(Debug, Default)]
struct Slot {
    writes: AtomicU64,
    entry: tokio::sync::Mutex<Option<CacheEntry>>,
}

/// Shared freshness engine. Construct once and share behind an `Arc`.
pub struct FreshnessCache {
    fetcher: Arc<dyn BarFetcher>,
    synthesizer: Arc<dyn SeriesSynthesizer>,
    config: FreshnessConfig,
    log: LogEmitter,
    slots: Mutex<HashMap<SeriesKey, Arc<Slot>>>,
    last_key: Mutex<Option<SeriesKey>>,
}

impl FreshnessCache {
    pub fn new(fetcher: Arc<dyn BarFetcher>, synthesizer: Arc<dyn SeriesSynthesizer>) -> Self {
        Self {
            fetcher,
            synthesizer,
            config: FreshnessConfig::default(),
            log: LogEmitter::disabled(),
            slots: Mutex::new(HashMap::new()),
            last_key: Mutex::new(None),
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn with_config(mut self, config: FreshnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &FreshnessConfig {
        &self.config
    }

    /// Resolve through the cache-wide view: the key change rule compares
    /// against whatever key was resolved last on this method.
    pub async fn resolve(&self, symbol: &Symbol, interval: Interval) -> Resolution {
        let key = SeriesKey::new(symbol.clone(), interval);
        let key_changed = {
            let mut last_key = self
                .last_key
                .lock()
                .expect("last key lock is not poisoned");
            let changed = last_key.as_ref() != Some(&key);
            *last_key = Some(key.clone());
            changed
        };
        self.resolve_key(key, key_changed).await
    }

    /// Independent consumer handle with its own key change tracking.
    pub fn view(self: &Arc<Self>) -> SeriesView {
        SeriesView {
            cache: Arc::clone(self),
            last_key: None,
        }
    }

    pub async fn snapshot(&self, key: &SeriesKey) -> Option<CacheEntry> {
        let slot = self.existing_slot(key)?;
        let entry = slot.entry.lock().await;
        entry.clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("slot map lock is not poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys = self
            .slots
            .lock()
            .expect("slot map lock is not poisoned")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    /// Drop one key. A resolve already holding the key finishes on the
    /// detached slot.
    pub fn invalidate(&self, key: &SeriesKey) -> bool {
        self.slots
            .lock()
            .expect("slot map lock is not poisoned")
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .expect("slot map lock is not poisoned")
            .clear();
    }

    fn slot(&self, key: &SeriesKey) -> Arc<Slot> {
        let mut slots = self.slots.lock().expect("slot map lock is not poisoned");
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &SeriesKey) -> Option<Arc<Slot>> {
        self.slots
            .lock()
            .expect("slot map lock is not poisoned")
            .get(key)
            .cloned()
    }

    async fn resolve_key(&self, key: SeriesKey, key_changed: bool) -> Resolution {
        let slot = self.slot(&key);
        let writes_seen = slot.writes.load(Ordering::Acquire);
        let mut guard = slot.entry.lock().await;
        let coalesced = slot.writes.load(Ordering::Acquire) != writes_seen;

        let now = Instant::now();
        let decision = decide(
            guard.as_ref(),
            key_changed,
            coalesced,
            now,
            &self.config,
            key.interval,
        );
        let reason = match (decision, guard.as_ref()) {
            (Decision::Serve(reason), Some(entry)) => {
                tracing::debug!(key = %key, ?reason, retry_count = entry.retry_count, "serving cached series");
                if reason == ServeReason::BreakerOpen {
                    self.log.info(format!(
                        "Holding demo data for {} ({}) after {} failed attempts",
                        key.symbol, key.interval, entry.retry_count
                    ));
                }
                return Resolution::cached(entry);
            }
            (Decision::Fetch(reason), _) => reason,
            (Decision::Serve(_), None) => FetchReason::NoEntry,
        };

        let previous_retries = match (guard.as_ref(), reason) {
            (Some(entry), FetchReason::Stale) => entry.retry_count,
            _ => 0,
        };
        let retry_count = previous_retries.saturating_add(1);
        // The count is only committed with the attempt's result; a resolve
        // dropped mid-fetch leaves the stored count untouched.
        if let Some(entry) = guard.as_mut() {
            entry.last_attempt_at = now;
        }
        tracing::debug!(key = %key, ?reason, retry_count, "fetching series");

        let (series, mut is_synthetic, outcome, failure) =
            match self.fetcher.fetch(&key.symbol, key.interval).await {
                Ok(series) if !series.is_empty() => (series, false, ResolveOutcome::Fetched, None),
                Ok(_) => self.fallback(
                    &key,
                    FetchFailure::NotFound {
                        label: key.interval.series_label(),
                    },
                ),
                Err(failure) => self.fallback(&key, failure),
            };

        if !is_synthetic
            && has_uniform_spacing(
                &series.bars,
                self.config.demo_min_bars,
                self.config.demo_spacing_tolerance,
            )
        {
            is_synthetic = true;
            tracing::warn!(key = %key, bars = series.len(), "upstream series has regular spacing; flagging as demo data");
            self.log.warning(format!(
                "{} ({}) data looks generated; marking as demo data",
                key.symbol, key.interval
            ));
        }

        let retry_count = match outcome {
            ResolveOutcome::Fetched => 0,
            _ => retry_count,
        };
        let entry = CacheEntry {
            series: Arc::new(series),
            fetched_at: Instant::now(),
            is_synthetic,
            retry_count,
            last_attempt_at: now,
        };
        let resolution = Resolution {
            series: Arc::clone(&entry.series),
            is_synthetic,
            retry_count,
            fetched_at: entry.fetched_at,
            outcome,
            failure,
        };

        *guard = Some(entry);
        slot.writes.fetch_add(1, Ordering::Release);
        resolution
    }

    fn fallback(
        &self,
        key: &SeriesKey,
        failure: FetchFailure,
    ) -> (BarSeries, bool, ResolveOutcome, Option<FetchFailure>) {
        let series = self.synthesizer.synthesize(&key.symbol, key.interval);
        tracing::info!(key = %key, code = failure.code(), bars = series.len(), "falling back to synthetic series");
        self.log.warning(format!(
            "Using demo data for {} ({}): {failure}",
            key.symbol, key.interval
        ));
        (series, true, ResolveOutcome::Synthesized, Some(failure))
    }
}

impl std::fmt::Debug for FreshnessCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshnessCache")
            .field("config", &self.config)
            .field("keys", &self.len())
            .finish_non_exhaustive()
    }
}

/// Consumer handle over a shared [`FreshnessCache`].
///
/// Each view remembers the key it resolved last, so switching symbol or
/// interval on one view forces a fetch without disturbing other views.
#[derive(Debug, Clone)]
pub struct SeriesView {
    cache: Arc<FreshnessCache>,
    last_key: Option<SeriesKey>,
}

impl SeriesView {
    pub async fn resolve(&mut self, symbol: &Symbol, interval: Interval) -> Resolution {
        let key = SeriesKey::new(symbol.clone(), interval);
        let key_changed = self.last_key.as_ref() != Some(&key);
        self.last_key = Some(key.clone());
        self.cache.resolve_key(key, key_changed).await
    }
}

/// Wires a [`FreshnessCache`] from its collaborators.
///
/// ```rust,ignore
/// use tickfresh_core::FreshnessCache;
///
/// // Live upstream, credentials from the environment.
/// let cache = FreshnessCache::builder().with_real_client().build();
///
/// // Never touches the network; every resolve is synthetic.
/// let offline = FreshnessCache::builder().with_offline_mode().build();
/// ```
#[derive(Default)]
pub struct EngineBuilder {
    config: FreshnessConfig,
    generator_config: GeneratorConfig,
    client_config: Option<ClientConfig>,
    offline: bool,
    seed: Option<u64>,
    fetcher: Option<Arc<dyn BarFetcher>>,
    synthesizer: Option<Arc<dyn SeriesSynthesizer>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live upstream with credentials read from the environment.
    pub fn with_real_client(mut self) -> Self {
        self.offline = false;
        self.client_config = Some(ClientConfig::from_env());
        self
    }

    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.offline = false;
        self.client_config = Some(config);
        self
    }

    /// Use the no-op transport; every resolve falls back to synthetic data.
    pub fn with_offline_mode(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn BarFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SeriesSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_config(mut self, config: FreshnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator_config = config;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Arc<FreshnessCache> {
        let log = self.sink.map(LogEmitter::new).unwrap_or_default();

        let fetcher = self.fetcher.unwrap_or_else(|| {
            let client = if self.offline {
                AlphaVantageClient::offline()
            } else {
                let config = self.client_config.unwrap_or_else(ClientConfig::from_env);
                if config.is_demo_key() {
                    log.info("No API key configured; using the demo credential");
                }
                AlphaVantageClient::new(Arc::new(crate::ReqwestHttpClient::new()), config)
            };
            Arc::new(client.with_log(log.clone()))
        });

        let synthesizer = self.synthesizer.unwrap_or_else(|| {
            let generator = match self.seed {
                Some(seed) => SeriesGenerator::seeded(seed),
                None => SeriesGenerator::new(),
            };
            Arc::new(generator.with_config(self.generator_config))
        });

        Arc::new(
            FreshnessCache::new(fetcher, synthesizer)
                .with_config(self.config)
                .with_log(log),
        )
    }
}
