//! Behavior-driven tests for the freshness cache
//!
//! These tests verify HOW the cache decides between serving, fetching and
//! synthesizing: fetch spacing, key changes, the retry breaker, demo
//! detection and per-key serialization. Time runs on tokio's paused clock.

mod support;

use std::sync::Arc;
use std::time::Duration;

use tickfresh_core::{
    AlphaVantageClient, BufferedLogSink, ClientConfig, FetchFailure, FreshnessCache, Interval,
    LogLevel, ResolveOutcome, SeriesKey,
};

use support::{
    engine, live_series, symbol, uniform_series, CountingSynthesizer, ScriptedFetcher,
    ScriptedHttpClient,
};

const SPACING: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Freshness: Reuse Within The Spacing Window
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_resolved_twice_within_spacing_system_fetches_once() {
    // Given: A healthy upstream
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let aapl = symbol("AAPL");

    // When: The dashboard resolves the same key twice in quick succession
    let first = cache.resolve(&aapl, Interval::OneMinute).await;
    tokio::time::advance(Duration::from_secs(90)).await;
    let second = cache.resolve(&aapl, Interval::OneMinute).await;

    // Then: Only one upstream attempt was made and both calls saw the same series
    assert_eq!(fetcher.attempts(), 1);
    assert_eq!(first.outcome, ResolveOutcome::Fetched);
    assert_eq!(second.outcome, ResolveOutcome::Cached);
    assert!(Arc::ptr_eq(&first.series, &second.series));
    assert!(!second.is_synthetic);
}

#[tokio::test(start_paused = true)]
async fn when_long_interval_entry_is_young_system_serves_it_after_spacing() {
    // Given: Daily data fetched a few minutes ago
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let msft = symbol("MSFT");
    cache.resolve(&msft, Interval::Daily).await;

    // When: The spacing window passes but the daily max age does not
    tokio::time::advance(Duration::from_secs(60 * 60)).await;
    let resolution = cache.resolve(&msft, Interval::Daily).await;

    // Then: The cached series is served
    assert_eq!(resolution.outcome, ResolveOutcome::Cached);
    assert_eq!(fetcher.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_intraday_entry_outlives_max_age_system_refetches() {
    // Given: One-minute data fetched earlier
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let nvda = symbol("NVDA");
    cache.resolve(&nvda, Interval::OneMinute).await;

    // When: Both the spacing window and the five-minute max age pass
    tokio::time::advance(SPACING + Duration::from_secs(1)).await;
    let resolution = cache.resolve(&nvda, Interval::OneMinute).await;

    // Then: A new upstream attempt is made
    assert_eq!(resolution.outcome, ResolveOutcome::Fetched);
    assert_eq!(fetcher.attempts(), 2);
}

// =============================================================================
// Freshness: Key Changes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_interval_changes_within_spacing_system_fetches_again() {
    // Given: AAPL one-minute data was just fetched
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let aapl = symbol("AAPL");
    cache.resolve(&aapl, Interval::OneMinute).await;

    // When: The user switches to five-minute bars and back within the spacing window
    tokio::time::advance(Duration::from_secs(10)).await;
    let switched = cache.resolve(&aapl, Interval::FiveMinutes).await;
    let back = cache.resolve(&aapl, Interval::OneMinute).await;

    // Then: Each change bypasses the staleness checks
    assert_eq!(switched.outcome, ResolveOutcome::Fetched);
    assert_eq!(back.outcome, ResolveOutcome::Fetched);
    assert_eq!(fetcher.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn when_views_track_keys_independently_system_does_not_cross_trigger() {
    // Given: Two dashboard panels showing different keys
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let mut left = cache.view();
    let mut right = cache.view();
    let aapl = symbol("AAPL");
    let tsla = symbol("TSLA");

    left.resolve(&aapl, Interval::FiveMinutes).await;
    right.resolve(&tsla, Interval::FiveMinutes).await;

    // When: Each panel resolves its own key again
    let left_again = left.resolve(&aapl, Interval::FiveMinutes).await;
    let right_again = right.resolve(&tsla, Interval::FiveMinutes).await;

    // Then: Neither counts as a key change
    assert_eq!(left_again.outcome, ResolveOutcome::Cached);
    assert_eq!(right_again.outcome, ResolveOutcome::Cached);
    assert_eq!(fetcher.attempts(), 2);
}

// =============================================================================
// Freshness: Retry Breaker
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_upstream_fails_twice_system_stops_fetching() {
    // Given: An upstream that always fails
    let fetcher = Arc::new(ScriptedFetcher::failing(FetchFailure::Transport(
        String::from("connection refused"),
    )));
    let synthesizer = Arc::new(CountingSynthesizer::new());
    let cache = engine(Arc::clone(&fetcher), Arc::clone(&synthesizer));
    let aapl = symbol("AAPL");

    // When: Two failing attempts are made, then a third resolve
    let first = cache.resolve(&aapl, Interval::OneMinute).await;
    tokio::time::advance(SPACING).await;
    let second = cache.resolve(&aapl, Interval::OneMinute).await;
    tokio::time::advance(SPACING).await;
    let third = cache.resolve(&aapl, Interval::OneMinute).await;

    // Then: The third resolve serves the cached synthetic series without fetching
    assert_eq!(first.outcome, ResolveOutcome::Synthesized);
    assert_eq!(first.retry_count, 1);
    assert_eq!(second.outcome, ResolveOutcome::Synthesized);
    assert_eq!(second.retry_count, 2);
    assert_eq!(third.outcome, ResolveOutcome::Cached);
    assert!(third.is_synthetic);
    assert!(Arc::ptr_eq(&second.series, &third.series));
    assert_eq!(fetcher.attempts(), 2);
    assert_eq!(synthesizer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn when_resolve_is_dropped_mid_fetch_system_keeps_retry_count() {
    // Given: A slow upstream whose first attempt failed
    let fetcher = Arc::new(
        ScriptedFetcher::failing(FetchFailure::Transport(String::from("connection reset")))
            .with_delay(Duration::from_secs(30)),
    );
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let amd = symbol("AMD");
    let key = SeriesKey::new(amd.clone(), Interval::OneMinute);
    let first = cache.resolve(&amd, Interval::OneMinute).await;
    assert_eq!(first.retry_count, 1);

    // When: The next attempt is abandoned by its caller before the upstream answers
    tokio::time::advance(SPACING + Duration::from_secs(1)).await;
    let abandoned =
        tokio::time::timeout(Duration::from_secs(1), cache.resolve(&amd, Interval::OneMinute))
            .await;
    assert!(abandoned.is_err());

    // Then: The stored entry still records a single failure
    let entry = cache.snapshot(&key).await.expect("entry survives");
    assert!(entry.is_synthetic);
    assert_eq!(entry.retry_count, 1);

    // And: The next completed failure is the one that opens the breaker
    tokio::time::advance(SPACING + Duration::from_secs(1)).await;
    let second = cache.resolve(&amd, Interval::OneMinute).await;
    assert_eq!(second.outcome, ResolveOutcome::Synthesized);
    assert_eq!(second.retry_count, 2);
    tokio::time::advance(SPACING + Duration::from_secs(1)).await;
    let held = cache.resolve(&amd, Interval::OneMinute).await;
    assert_eq!(held.outcome, ResolveOutcome::Cached);
    assert_eq!(fetcher.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn when_breaker_is_open_key_change_resets_retries() {
    // Given: A key whose breaker has tripped
    let fetcher = Arc::new(ScriptedFetcher::failing(FetchFailure::HttpError {
        status: 503,
    }));
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let ibm = symbol("IBM");
    cache.resolve(&ibm, Interval::OneMinute).await;
    tokio::time::advance(SPACING).await;
    cache.resolve(&ibm, Interval::OneMinute).await;

    // When: The user switches interval and comes back
    cache.resolve(&ibm, Interval::Daily).await;
    let back = cache.resolve(&ibm, Interval::OneMinute).await;

    // Then: The return is a fresh attempt with a reset retry count
    assert_eq!(back.outcome, ResolveOutcome::Synthesized);
    assert_eq!(back.retry_count, 1);
    assert_eq!(fetcher.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn when_upstream_recovers_system_resets_retry_count() {
    // Given: An upstream that fails once and then recovers
    let fetcher = Arc::new(ScriptedFetcher::new(|symbol, interval, attempt| {
        if attempt == 1 {
            Err(FetchFailure::Timeout { timeout_ms: 10_000 })
        } else {
            Ok(live_series(symbol, interval, 6))
        }
    }));
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let meta = symbol("META");

    // When: The second attempt succeeds
    let failed = cache.resolve(&meta, Interval::FiveMinutes).await;
    tokio::time::advance(Duration::from_secs(15 * 60)).await;
    let recovered = cache.resolve(&meta, Interval::FiveMinutes).await;

    // Then: Real data replaces the demo series and the retry count resets
    assert!(failed.is_synthetic);
    assert_eq!(failed.failure, Some(FetchFailure::Timeout { timeout_ms: 10_000 }));
    assert_eq!(recovered.outcome, ResolveOutcome::Fetched);
    assert!(!recovered.is_synthetic);
    assert_eq!(recovered.retry_count, 0);
    assert_eq!(recovered.series.len(), 6);
}

// =============================================================================
// Freshness: Demo Detection And Fallback
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_upstream_returns_regular_spacing_system_flags_demo_data() {
    // Given: An upstream success whose five bars are exactly one step apart
    let fetcher = Arc::new(ScriptedFetcher::new(|symbol, interval, _| {
        Ok(uniform_series(symbol, interval, 5))
    }));
    let synthesizer = Arc::new(CountingSynthesizer::new());
    let sink = Arc::new(BufferedLogSink::default());
    let cache = FreshnessCache::builder()
        .with_fetcher(fetcher)
        .with_synthesizer(Arc::clone(&synthesizer) as _)
        .with_log_sink(Arc::clone(&sink) as _)
        .build();

    // When: The series is resolved
    let resolution = cache.resolve(&symbol("GOOGL"), Interval::FifteenMinutes).await;

    // Then: It is served as upstream data but marked synthetic
    assert_eq!(resolution.outcome, ResolveOutcome::Fetched);
    assert!(resolution.is_synthetic);
    assert_eq!(resolution.series.len(), 5);
    assert_eq!(synthesizer.calls(), 0);
    assert!(sink
        .messages()
        .iter()
        .any(|message| message.level == LogLevel::Warning));
}

#[tokio::test(start_paused = true)]
async fn when_upstream_sends_rate_limit_note_system_synthesizes_once() {
    // Given: The real client talking to an upstream that answers with a Note
    let http = Arc::new(ScriptedHttpClient::json(
        r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
    ));
    let client = AlphaVantageClient::new(http.clone(), ClientConfig::default());
    let synthesizer = Arc::new(CountingSynthesizer::new());
    let cache = FreshnessCache::builder()
        .with_fetcher(Arc::new(client))
        .with_synthesizer(Arc::clone(&synthesizer) as _)
        .build();

    // When: AAPL one-minute data is resolved
    let resolution = cache.resolve(&symbol("AAPL"), Interval::OneMinute).await;

    // Then: A non-empty synthetic series is served from exactly one generation
    assert!(!resolution.series.is_empty());
    assert!(resolution.is_synthetic);
    assert_eq!(resolution.outcome, ResolveOutcome::Synthesized);
    assert!(matches!(resolution.failure, Some(FetchFailure::RateLimited(_))));
    assert_eq!(synthesizer.calls(), 1);
    assert_eq!(http.requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn when_upstream_returns_empty_series_system_falls_back() {
    // Given: A fetcher that succeeds with no bars
    let fetcher = Arc::new(ScriptedFetcher::new(|symbol, interval, _| {
        Ok(live_series(symbol, interval, 0))
    }));
    let synthesizer = Arc::new(CountingSynthesizer::new());
    let cache = engine(fetcher, Arc::clone(&synthesizer));

    // When: The series is resolved
    let resolution = cache.resolve(&symbol("JPM"), Interval::Weekly).await;

    // Then: The empty result is treated as not found
    assert!(resolution.is_synthetic);
    assert!(matches!(
        resolution.failure,
        Some(FetchFailure::NotFound { label: "Weekly Time Series" })
    ));
    assert_eq!(synthesizer.calls(), 1);
}

// =============================================================================
// Freshness: Per-Key Serialization
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_same_key_resolved_concurrently_system_fetches_once() {
    // Given: A slow upstream and two panels mounting the same key
    let fetcher = Arc::new(ScriptedFetcher::live().with_delay(Duration::from_secs(2)));
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let mut first_panel = cache.view();
    let mut second_panel = cache.view();
    let amzn = symbol("AMZN");

    // When: Both resolve at the same moment
    let (first, second) = tokio::join!(
        first_panel.resolve(&amzn, Interval::ThirtyMinutes),
        second_panel.resolve(&amzn, Interval::ThirtyMinutes),
    );

    // Then: One attempt served both callers
    assert_eq!(fetcher.attempts(), 1);
    assert_eq!(first.outcome, ResolveOutcome::Fetched);
    assert_eq!(second.outcome, ResolveOutcome::Cached);
    assert!(Arc::ptr_eq(&first.series, &second.series));
}

#[tokio::test(start_paused = true)]
async fn when_different_keys_resolved_concurrently_system_fetches_both() {
    // Given: A slow upstream
    let fetcher = Arc::new(ScriptedFetcher::live().with_delay(Duration::from_secs(2)));
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let mut first_panel = cache.view();
    let mut second_panel = cache.view();
    let aapl = symbol("AAPL");
    let nflx = symbol("NFLX");

    // When: Two different symbols resolve together
    let started = tokio::time::Instant::now();
    tokio::join!(
        first_panel.resolve(&aapl, Interval::OneMinute),
        second_panel.resolve(&nflx, Interval::OneMinute),
    );

    // Then: Both fetched, in parallel
    assert_eq!(fetcher.attempts(), 2);
    assert!(started.elapsed() < Duration::from_secs(4));
}

// =============================================================================
// Freshness: Operator Surface
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_key_is_invalidated_system_fetches_on_next_resolve() {
    // Given: A cached key
    let fetcher = Arc::new(ScriptedFetcher::live());
    let cache = engine(Arc::clone(&fetcher), Arc::new(CountingSynthesizer::new()));
    let aapl = symbol("AAPL");
    cache.resolve(&aapl, Interval::SixtyMinutes).await;
    let key = SeriesKey::new(aapl.clone(), Interval::SixtyMinutes);
    assert_eq!(cache.keys(), vec![key.clone()]);

    // When: The operator invalidates it
    assert!(cache.invalidate(&key));
    let resolution = cache.resolve(&aapl, Interval::SixtyMinutes).await;

    // Then: The next resolve goes upstream
    assert_eq!(resolution.outcome, ResolveOutcome::Fetched);
    assert_eq!(fetcher.attempts(), 2);
    let entry = cache.snapshot(&key).await.expect("entry after resolve");
    assert_eq!(entry.retry_count, 0);
    assert!(!entry.is_synthetic);
}

#[tokio::test(start_paused = true)]
async fn when_cache_is_cleared_system_forgets_every_key() {
    // Given: Two cached keys
    let cache = engine(
        Arc::new(ScriptedFetcher::live()),
        Arc::new(CountingSynthesizer::new()),
    );
    cache.resolve(&symbol("AAPL"), Interval::Daily).await;
    cache.resolve(&symbol("MSFT"), Interval::Daily).await;
    assert_eq!(cache.len(), 2);

    // When: The cache is cleared
    cache.clear();

    // Then: No entries remain
    assert!(cache.is_empty());
    assert!(cache
        .snapshot(&SeriesKey::new(symbol("AAPL"), Interval::Daily))
        .await
        .is_none());
}
