// Control plane: fan-out admission, per-venue circuit breakers and query
// cancellation
//
// Bounds how many hop quotes are in flight (and how many start per second)
// across all queries, and stops dialing venues whose recent calls mostly
// timed out or failed in transport.
//
// Numan Thabit 2025 Nov

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AdmissionControl {
    max_inflight: Arc<Semaphore>,
    // Simple rate limiter: allow up to rate_per_sec within a 1s sliding window
    inner: Arc<Mutex<RateLimiter>>,
}

struct RateLimiter {
    rate_per_sec: u32,
    timestamps: VecDeque<Instant>,
    window: Duration,
}

impl AdmissionControl {
    pub fn new(max_inflight: usize, rate_per_sec: Option<u32>) -> Self {
        let rl = RateLimiter {
            rate_per_sec: rate_per_sec.unwrap_or(u32::MAX),
            timestamps: VecDeque::with_capacity(256),
            window: Duration::from_secs(1),
        };
        Self {
            max_inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
            inner: Arc::new(Mutex::new(rl)),
        }
    }

    /// Acquire a permit respecting max inflight and rate limit. `None` only
    /// if the semaphore was closed.
    pub async fn acquire(&self) -> Option<AdmissionPermit> {
        loop {
            let mut guard = self.inner.lock().await;
            let now = Instant::now();
            while let Some(front) = guard.timestamps.front() {
                if now.duration_since(*front) > guard.window {
                    guard.timestamps.pop_front();
                } else {
                    break;
                }
            }
            if (guard.timestamps.len() as u64) < guard.rate_per_sec as u64 {
                if guard.rate_per_sec != u32::MAX {
                    guard.timestamps.push_back(now);
                }
                break;
            }
            drop(guard);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let permit = self.max_inflight.clone().acquire_owned().await.ok()?;
        Some(AdmissionPermit { _permit: permit })
    }
}

pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Clone, Default)]
pub struct CircuitBreakers {
    inner: Arc<Mutex<HashMap<String, Breaker>>>,
    settings: BreakerSettings,
}

#[derive(Clone, Copy, Debug)]
pub struct BreakerSettings {
    pub max_window: usize,
    pub threshold: f32,
    pub min_samples: usize,
    pub open_cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_window: 100,
            threshold: 0.5,
            min_samples: 20,
            open_cooldown: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
struct Breaker {
    window: VecDeque<bool>, // true=failure, false=success
    open_until: Option<Instant>,
}

impl Breaker {
    fn new(settings: &BreakerSettings) -> Self {
        Self {
            window: VecDeque::with_capacity(settings.max_window),
            open_until: None,
        }
    }
}

impl CircuitBreakers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: BreakerSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    pub async fn is_open(&self, venue: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let b = inner
            .entry(venue.to_string())
            .or_insert_with(|| Breaker::new(&self.settings));
        if let Some(until) = b.open_until {
            if Instant::now() < until {
                return true;
            }
            // half-open: start over with a clean window
            b.open_until = None;
            b.window.clear();
            debug!(venue = %venue, "circuit closed after cooldown");
        }
        false
    }

    pub async fn record_success(&self, venue: &str) {
        self.record(venue, false).await;
    }

    pub async fn record_failure(&self, venue: &str) {
        self.record(venue, true).await;
    }

    async fn record(&self, venue: &str, failure: bool) {
        let s = self.settings;
        let mut inner = self.inner.lock().await;
        let b = inner
            .entry(venue.to_string())
            .or_insert_with(|| Breaker::new(&s));
        if b.window.len() == s.max_window {
            b.window.pop_front();
        }
        b.window.push_back(failure);

        let samples = b.window.len();
        if samples >= s.min_samples {
            let fails = b.window.iter().filter(|x| **x).count();
            let rate = fails as f32 / samples as f32;
            if rate >= s.threshold && b.open_until.is_none() {
                b.open_until = Some(Instant::now() + s.open_cooldown);
                warn!(venue = %venue, rate = rate, samples = samples, "venue circuit opened");
            }
        }
    }
}

/// Caller side of a query cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Query side of a cancellation. Dropping the handle without cancelling
/// leaves the query running to completion.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is gone.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
