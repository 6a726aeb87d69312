use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;
use crate::metrics::{SWEPT_KEYS, TRACKED_KEYS};

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

impl RateLimitEntry {
    // placeholder that the admission path immediately treats as elapsed
    fn expired(now: Instant) -> Self {
        Self {
            count: 0,
            window_reset_at: now,
        }
    }
}

// longest window accepted, keeps `Instant + window` clear of overflow
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 24 * 60 * 60);

// Window length and quota for one limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.window.is_zero() {
            return Err(RateLimitError::ZeroWindow);
        }
        if self.window > MAX_WINDOW {
            return Err(RateLimitError::WindowTooLarge {
                window: self.window,
                max: MAX_WINDOW,
            });
        }
        if self.max_requests == 0 {
            return Err(RateLimitError::ZeroQuota);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitDecision::Allowed { limit, .. } | RateLimitDecision::Limited { limit, .. } => {
                *limit
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateLimitDecision::Allowed { remaining, .. } => *remaining,
            RateLimitDecision::Limited { .. } => 0,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitDecision::Limited { retry_after, .. } => Some(*retry_after),
            RateLimitDecision::Allowed { .. } => None,
        }
    }
}

struct RateLimiterInner {
    name: &'static str,
    window: Duration,
    max_requests: u32,
    records: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

// clones share state
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.inner.name)
            .field("window", &self.inner.window)
            .field("max_requests", &self.inner.max_requests)
            .field("tracked_keys", &self.inner.records.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self, RateLimitError> {
        Self::build("default", config, clock)
    }

    pub(crate) fn build(
        name: &'static str,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RateLimitError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RateLimiterInner {
                name,
                window: config.window,
                max_requests: config.max_requests,
                records: DashMap::new(),
                clock,
            }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn max_requests(&self) -> u32 {
        self.inner.max_requests
    }

    // expired records included until swept
    pub fn tracked_keys(&self) -> usize {
        self.inner.records.len()
    }

    // "" is an ordinary key: callers without an identifier share one bucket
    pub fn is_allowed(&self, key: &str) -> bool {
        self.check(key).is_allowed()
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.inner.clock.now();
        let limit = self.inner.max_requests;

        // the shard write lock is held until `entry` drops
        let mut entry = match self.inner.records.get_mut(key) {
            Some(entry) => entry,
            None => self
                .inner
                .records
                .entry(key.to_owned())
                .or_insert(RateLimitEntry::expired(now)),
        };

        // window elapsed (or brand new)? start a fresh one
        if now >= entry.window_reset_at {
            entry.count = 1;
            // window <= MAX_WINDOW, checked in validate
            entry.window_reset_at = now + self.inner.window;
            trace!(limiter = self.inner.name, key, "window opened");
            return RateLimitDecision::Allowed {
                limit,
                remaining: limit - 1,
            };
        }

        if entry.count < limit {
            entry.count += 1;
            return RateLimitDecision::Allowed {
                limit,
                remaining: limit - entry.count,
            };
        }

        RateLimitDecision::Limited {
            limit,
            retry_after: entry.window_reset_at.saturating_duration_since(now),
        }
    }

    // expiry is re-checked under the shard lock, a refreshed record stays
    pub fn sweep(&self) -> usize {
        let now = self.inner.clock.now();
        let mut removed = 0;
        self.inner.records.retain(|_, entry| {
            let live = now < entry.window_reset_at;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    pub fn spawn_sweeper(&self, interval: Duration) -> Result<Sweeper, RateLimitError> {
        if interval.is_zero() {
            return Err(RateLimitError::ZeroSweepInterval);
        }

        let limiter = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(limiter = limiter.name(), ?interval, "sweeper started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        let remaining = limiter.tracked_keys();
                        SWEPT_KEYS
                            .with_label_values(&[limiter.name()])
                            .inc_by(removed as f64);
                        TRACKED_KEYS
                            .with_label_values(&[limiter.name()])
                            .set(remaining as f64);
                        if removed > 0 {
                            debug!(limiter = limiter.name(), removed, remaining, "swept expired keys");
                        }
                    }
                }
            }

            debug!(limiter = limiter.name(), "sweeper stopped");
        });

        Ok(Sweeper {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

// Background sweep task, aborted on drop
#[derive(Debug)]
pub struct Sweeper {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
