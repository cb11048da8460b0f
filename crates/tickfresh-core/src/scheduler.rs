//! Timer-driven refresh of mounted `(symbol, interval)` subscriptions.
//!
//! Each [`Subscription`] owns one background task that resolves through its
//! own [`SeriesView`], publishes the result on a `watch` channel and sleeps
//! for the interval's refresh period. The task stops for good once the
//! served data is synthetic, the retry budget is spent, or the interval has
//! no refresh period (daily and longer).

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cache::{FreshnessCache, Resolution, SeriesView};
use crate::{Interval, SeriesKey, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// A timer is armed for the next resolve.
    Active,
    /// No further automatic resolves until the subscription is retargeted.
    Paused,
}

/// One published resolve.
#[derive(Debug, Clone)]
pub struct RefreshUpdate {
    pub key: SeriesKey,
    pub resolution: Resolution,
    pub state: RefreshState,
}

/// State a subscription enters after `resolution`.
pub fn refresh_state(
    resolution: &Resolution,
    interval: Interval,
    breaker_threshold: u32,
) -> RefreshState {
    if resolution.is_synthetic
        || resolution.retry_count >= breaker_threshold
        || interval.refresh_period().is_none()
    {
        RefreshState::Paused
    } else {
        RefreshState::Active
    }
}

/// Spawns refresh tasks against a shared cache.
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    cache: Arc<FreshnessCache>,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<FreshnessCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<FreshnessCache> {
        &self.cache
    }

    /// Start refreshing `symbol`/`interval` with an immediate resolve.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, symbol: Symbol, interval: Interval) -> Subscription {
        let (sender, receiver) = watch::channel(None);
        let mut subscription = Subscription {
            cache: Arc::clone(&self.cache),
            key: SeriesKey::new(symbol, interval),
            token: CancellationToken::new(),
            sender: Arc::new(sender),
            receiver,
        };
        subscription.spawn();
        subscription
    }
}

/// Handle to one refresh task. Dropping it cancels the task.
#[derive(Debug)]
pub struct Subscription {
    cache: Arc<FreshnessCache>,
    key: SeriesKey,
    token: CancellationToken,
    sender: Arc<watch::Sender<Option<RefreshUpdate>>>,
    receiver: watch::Receiver<Option<RefreshUpdate>>,
}

impl Subscription {
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// `Active` until an update for the current key reports otherwise.
    pub fn state(&self) -> RefreshState {
        self.receiver
            .borrow()
            .as_ref()
            .map_or(RefreshState::Active, |update| update.state)
    }

    pub fn latest(&self) -> Option<RefreshUpdate> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next update. Returns `None` once the subscription is
    /// paused and every update has been observed.
    pub async fn next_update(&mut self) -> Option<RefreshUpdate> {
        loop {
            if self.receiver.has_changed().unwrap_or(false) {
                if let Some(update) = self.receiver.borrow_and_update().clone() {
                    return Some(update);
                }
                continue;
            }
            if self.state() == RefreshState::Paused {
                return None;
            }
            self.receiver.changed().await.ok()?;
        }
    }

    /// Point the subscription at a new key: cancel the running task and
    /// resolve the new key immediately. No-op when the key is unchanged.
    pub fn retarget(&mut self, symbol: Symbol, interval: Interval) {
        let key = SeriesKey::new(symbol, interval);
        if key == self.key {
            return;
        }

        tracing::debug!(from = %self.key, to = %key, "retargeting subscription");
        self.cancel();
        self.key = key;
        self.token = CancellationToken::new();
        self.spawn();
    }

    pub fn unsubscribe(self) {}

    fn cancel(&self) {
        // Under the channel lock, so a task past its resolve cannot publish
        // after this returns.
        let token = &self.token;
        self.sender.send_if_modified(|slot| {
            token.cancel();
            *slot = None;
            false
        });
    }

    fn spawn(&mut self) {
        let task = RefreshTask {
            view: self.cache.view(),
            key: self.key.clone(),
            breaker_threshold: self.cache.config().breaker_threshold,
            period: self.cache.config().refresh_period(self.key.interval),
            token: self.token.clone(),
            sender: Arc::clone(&self.sender),
        };
        tokio::spawn(task.run());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct RefreshTask {
    view: SeriesView,
    key: SeriesKey,
    breaker_threshold: u32,
    period: Option<Duration>,
    token: CancellationToken,
    sender: Arc<watch::Sender<Option<RefreshUpdate>>>,
}

impl RefreshTask {
    async fn run(mut self) {
        let interval = self.key.interval;
        loop {
            if self.token.is_cancelled() {
                return;
            }

            // An in-flight resolve is left to finish; it only writes the
            // shared cache entry.
            let resolution = self.view.resolve(&self.key.symbol, interval).await;
            let state = refresh_state(&resolution, interval, self.breaker_threshold);
            let update = RefreshUpdate {
                key: self.key.clone(),
                resolution,
                state,
            };

            let token = &self.token;
            let published = self.sender.send_if_modified(|slot| {
                if token.is_cancelled() {
                    return false;
                }
                *slot = Some(update);
                true
            });
            if !published {
                return;
            }

            let period = match (state, self.period) {
                (RefreshState::Active, Some(period)) => period,
                _ => {
                    tracing::debug!(key = %self.key, "refresh paused");
                    return;
                }
            };

            tokio::select! {
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(period) => {}
            }
        }
    }
}
