//! Single upstream attempt with timeout and outcome classification.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ClientConfig;
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient, ReqwestHttpClient};
use crate::log::LogEmitter;
use crate::payload::{classify_payload, UpstreamPayload};
use crate::throttling::RequestThrottle;
use crate::{BarSeries, Interval, Symbol};

/// Why an upstream attempt produced no usable bars.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("upstream did not answer within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP status {status}")]
    HttpError { status: u16 },
    #[error("upstream error: {0}")]
    UpstreamError(String),
    #[error("upstream usage limit: {0}")]
    RateLimited(String),
    #[error("upstream payload has no '{label}' series")]
    NotFound { label: &'static str },
    #[error("malformed upstream payload: {0}")]
    ParseFailure(String),
}

impl FetchFailure {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "fetch.timeout",
            Self::Transport(_) => "fetch.transport",
            Self::HttpError { .. } => "fetch.http_error",
            Self::UpstreamError(_) => "fetch.upstream_error",
            Self::RateLimited(_) => "fetch.rate_limited",
            Self::NotFound { .. } => "fetch.not_found",
            Self::ParseFailure(_) => "fetch.parse_failure",
        }
    }

    /// Soft failures are expected in the demo tier and are not worth an error log.
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::NotFound { .. })
    }
}

/// One upstream attempt for a symbol/interval.
///
/// This is the seam [`FreshnessCache`](crate::FreshnessCache) calls on a
/// fetch decision; tests substitute scripted implementations.
pub trait BarFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, FetchFailure>> + Send + 'a>>;
}

/// Alpha Vantage time-series client.
#[derive(Clone)]
pub struct AlphaVantageClient {
    http_client: Arc<dyn HttpClient>,
    config: ClientConfig,
    throttle: RequestThrottle,
    log: LogEmitter,
}

impl AlphaVantageClient {
    pub fn new(http_client: Arc<dyn HttpClient>, config: ClientConfig) -> Self {
        let throttle = RequestThrottle::new(config.quota_window, config.quota_limit);
        Self {
            http_client,
            config,
            throttle,
            log: LogEmitter::disabled(),
        }
    }

    /// Real reqwest transport with credentials read from the environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::new()), ClientConfig::from_env())
    }

    /// Transport that never reaches the network.
    pub fn offline() -> Self {
        Self::new(Arc::new(NoopHttpClient), ClientConfig::default())
    }

    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn request_url(&self, symbol: &Symbol, interval: Interval) -> String {
        let mut url = format!(
            "{}?function={}&symbol={}",
            self.config.base_url,
            interval.upstream_function(),
            urlencoding::encode(symbol.as_str())
        );
        if let Some(upstream_interval) = interval.upstream_interval() {
            url.push_str("&interval=");
            url.push_str(upstream_interval);
        }
        url.push_str("&apikey=");
        url.push_str(&urlencoding::encode(&self.config.api_key));
        url
    }

    async fn attempt(&self, symbol: &Symbol, interval: Interval) -> Result<BarSeries, FetchFailure> {
        if let Err(wait) = self.throttle.try_acquire() {
            return Err(FetchFailure::RateLimited(format!(
                "local request quota exhausted; retry in {:.1}s",
                wait.as_secs_f64()
            )));
        }

        let request =
            HttpRequest::get(self.request_url(symbol, interval)).with_timeout(self.config.timeout);
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);

        // Expiry drops the transport future, which aborts the in-flight request.
        let response =
            match tokio::time::timeout(self.config.timeout, self.http_client.execute(request)).await
            {
                Err(_) => return Err(FetchFailure::Timeout { timeout_ms }),
                Ok(Err(error)) if error.is_timeout() => {
                    return Err(FetchFailure::Timeout { timeout_ms })
                }
                Ok(Err(error)) => return Err(FetchFailure::Transport(error.message().to_owned())),
                Ok(Ok(response)) => response,
            };

        if !response.is_success() {
            return Err(FetchFailure::HttpError {
                status: response.status,
            });
        }

        match classify_payload(&response.body, interval) {
            UpstreamPayload::TimeSeries(bars) => {
                Ok(BarSeries::new(symbol.clone(), interval, bars))
            }
            UpstreamPayload::UpstreamError(message) => Err(FetchFailure::UpstreamError(message)),
            UpstreamPayload::RateLimited(note) => Err(FetchFailure::RateLimited(note)),
            UpstreamPayload::NotFound { label } => Err(FetchFailure::NotFound { label }),
            UpstreamPayload::ParseFailure(message) => Err(FetchFailure::ParseFailure(message)),
        }
    }
}

impl BarFetcher for AlphaVantageClient {
    fn fetch<'a>(
        &'a self,
        symbol: &'a Symbol,
        interval: Interval,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, FetchFailure>> + Send + 'a>> {
        Box::pin(async move {
            self.log
                .info(format!("Fetching {interval} data for {symbol}..."));

            let outcome = self.attempt(symbol, interval).await;
            match &outcome {
                Ok(series) => {
                    tracing::info!(%symbol, %interval, bars = series.len(), "upstream fetch succeeded");
                    self.log.success(format!(
                        "Received {} {interval} bars for {symbol}",
                        series.len()
                    ));
                }
                Err(failure) if failure.is_soft() => {
                    tracing::warn!(%symbol, %interval, code = failure.code(), "upstream fetch failed: {failure}");
                    self.log
                        .warning(format!("{interval} request for {symbol} failed: {failure}"));
                }
                Err(failure) => {
                    tracing::warn!(%symbol, %interval, code = failure.code(), "upstream fetch failed: {failure}");
                    self.log
                        .error(format!("{interval} request for {symbol} failed: {failure}"));
                }
            }
            outcome
        })
    }
}

impl std::fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.config.base_url)
            .field("demo_key", &self.config.is_demo_key())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}
