//! Fixtures shared by the behaviour suites: scripted upstreams, counting
//! synthesizers and bar builders.

#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tickfresh_core::{
    Bar, BarFetcher, BarSeries, FetchFailure, FreshnessCache, HttpClient, HttpError,
    HttpRequest, HttpResponse, Interval, SeriesGenerator, SeriesSynthesizer, Symbol,
    UtcDateTime,
};

type Respond = dyn Fn(&Symbol, Interval, usize) -> Result<BarSeries, FetchFailure> + Send + Sync;

/// `BarFetcher` driven by a closure that sees the 1-based attempt number.
pub struct ScriptedFetcher {
    respond: Box<Respond>,
    attempts: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    pub fn new(
        respond: impl Fn(&Symbol, Interval, usize) -> Result<BarSeries, FetchFailure>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            attempts: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Every attempt returns an irregularly spaced live series.
    pub fn live() -> Self {
        Self::new(|symbol, interval, _| Ok(live_series(symbol, interval, 8)))
    }

    pub fn failing(failure: FetchFailure) -> Self {
        Self::new(move |_, _, _| Err(failure.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl BarFetcher for ScriptedFetcher {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, FetchFailure>> + Send + 'a>> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            (self.respond)(symbol, interval, attempt)
        })
    }
}

/// Seeded generator that counts invocations.
pub struct CountingSynthesizer {
    inner: SeriesGenerator,
    calls: AtomicUsize,
}

impl CountingSynthesizer {
    pub fn new() -> Self {
        Self {
            inner: SeriesGenerator::seeded(42),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SeriesSynthesizer for CountingSynthesizer {
    fn synthesize(&self, symbol: &Symbol, interval: Interval) -> BarSeries {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.synthesize(symbol, interval)
    }
}

/// `HttpClient` returning one canned response and counting requests.
pub struct ScriptedHttpClient {
    response: HttpResponse,
    requests: AtomicUsize,
}

impl ScriptedHttpClient {
    pub fn json(body: &str) -> Self {
        Self::with_response(HttpResponse::ok_json(body))
    }

    pub fn with_response(response: HttpResponse) -> Self {
        Self {
            response,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}

/// `HttpClient` that never answers and records when its future is dropped.
#[derive(Default)]
pub struct HangingHttpClient {
    dropped: Arc<AtomicBool>,
}

impl HangingHttpClient {
    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl HttpClient for HangingHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let flag = DropFlag(Arc::clone(&self.dropped));
        Box::pin(async move {
            let _flag = flag;
            std::future::pending::<Result<HttpResponse, HttpError>>().await
        })
    }
}

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

fn bar_at(ts: UtcDateTime, close: f64) -> Bar {
    Bar::new(ts, close, close + 0.5, close - 0.5, close, 1_000).expect("valid bar")
}

/// Bars with alternating one- and two-step gaps, like a feed with holes.
pub fn live_series(symbol: &Symbol, interval: Interval, count: usize) -> BarSeries {
    let start = UtcDateTime::parse("2024-01-02T14:30:00Z").expect("timestamp");
    let step = interval.step();
    let mut offset = Duration::ZERO;
    let bars = (0..count)
        .map(|index| {
            let ts = UtcDateTime::from_offset_datetime(start.into_inner() + offset)
                .expect("utc timestamp");
            offset += if index % 2 == 0 { step } else { step * 2 };
            bar_at(ts, 100.0 + index as f64)
        })
        .collect();
    BarSeries::new(symbol.clone(), interval, bars)
}

/// Bars exactly one step apart.
pub fn uniform_series(symbol: &Symbol, interval: Interval, count: usize) -> BarSeries {
    let start = UtcDateTime::parse("2024-01-02T14:30:00Z").expect("timestamp");
    let step = interval.step();
    let bars = (0..count)
        .map(|index| {
            let offset = step * u32::try_from(index).expect("small index");
            let ts = UtcDateTime::from_offset_datetime(start.into_inner() + offset)
                .expect("utc timestamp");
            bar_at(ts, 100.0 + index as f64)
        })
        .collect();
    BarSeries::new(symbol.clone(), interval, bars)
}

pub fn bars_with_closes(closes: &[f64]) -> Vec<Bar> {
    let start = UtcDateTime::parse("2024-01-02T00:00:00Z").expect("timestamp");
    closes
        .iter()
        .enumerate()
        .map(|(index, close)| {
            let offset = Duration::from_secs(86_400 * index as u64 + 3_600 * (index % 3) as u64);
            let ts = UtcDateTime::from_offset_datetime(start.into_inner() + offset)
                .expect("utc timestamp");
            bar_at(ts, *close)
        })
        .collect()
}

pub fn engine(
    fetcher: Arc<ScriptedFetcher>,
    synthesizer: Arc<CountingSynthesizer>,
) -> Arc<FreshnessCache> {
    FreshnessCache::builder()
        .with_fetcher(fetcher)
        .with_synthesizer(synthesizer)
        .build()
}
