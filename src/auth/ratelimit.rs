//! Per-client request admission
//!
//! This module provides token-bucket rate limiting keyed by client identifier
//! (normally the client IP). Each client gets a bucket holding up to `quota`
//! tokens that refills continuously at `quota / window` tokens per second;
//! every admitted request consumes one token.
//!
//! Idle buckets are removed by a background sweep running on the tokio
//! runtime (see [`spawn_sweeper`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Configuration for the admission controller
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Requests allowed per window; also the burst capacity
    pub requests: u32,

    /// Window over which `requests` are refilled
    pub window: Duration,

    /// Buckets untouched for longer than this are evicted
    pub idle_timeout: Duration,

    /// How often the eviction sweep runs
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(180), // 3 minutes
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Continuous refill rate in tokens per second
    pub fn refill_rate(&self) -> f64 {
        let secs = self.window.as_secs_f64();
        if secs > 0.0 {
            f64::from(self.requests) / secs
        } else {
            0.0
        }
    }

    /// Maximum number of tokens a bucket can hold
    pub fn capacity(&self) -> f64 {
        f64::from(self.requests)
    }
}

/// Token bucket for one client
///
/// Tokens are counted in fixed-point units of `1 / window_nanos` token, so
/// `elapsed_nanos * requests` units are owed after `elapsed` and refill is
/// exact for any quota and window.
#[derive(Debug, Clone)]
struct Bucket {
    /// Available units, always within `[0, capacity]`
    units: u128,

    /// Last refill/consume timestamp
    last_seen: Instant,
}

/// Fixed-point token arithmetic shared by every bucket
#[derive(Debug, Clone, Copy)]
struct Scale {
    /// Units in one token
    per_token: u128,

    /// Units gained per elapsed nanosecond
    per_nano: u128,

    /// Bucket ceiling in units
    capacity: u128,
}

impl Scale {
    fn new(config: &RateLimitConfig) -> Self {
        let window_nanos = config.window.as_nanos();
        let requests = u128::from(config.requests);
        let per_token = window_nanos.max(1);
        Self {
            per_token,
            per_nano: if window_nanos > 0 { requests } else { 0 },
            capacity: requests * per_token,
        }
    }
}

impl Bucket {
    fn full(scale: &Scale, now: Instant) -> Self {
        Self {
            units: scale.capacity,
            last_seen: now,
        }
    }

    fn refill(&mut self, now: Instant, scale: &Scale) {
        let elapsed = now.saturating_duration_since(self.last_seen).as_nanos();
        let owed = elapsed.saturating_mul(scale.per_nano);
        self.units = self.units.saturating_add(owed).min(scale.capacity);
        // Never move the clock backwards for callers that captured `now` early
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    fn try_consume(&mut self, scale: &Scale) -> bool {
        if self.units >= scale.per_token {
            self.units -= scale.per_token;
            true
        } else {
            false
        }
    }
}

/// Admission controller
///
/// Thread-safe token-bucket limiter. The bucket table sits behind a single
/// mutex, so lookup-or-create, refill+consume and eviction are all
/// linearized and a client never gets two buckets.
pub struct AdmissionController {
    config: RateLimitConfig,
    scale: Scale,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl std::fmt::Debug for AdmissionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionController")
            .field("config", &self.config)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

impl AdmissionController {
    /// Create a new admission controller with the given configuration
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            scale: Scale::new(&config),
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new admission controller with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        // Bucket updates are plain arithmetic, a poisoned table is still consistent
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether a request from `client` is admitted
    ///
    /// Returns `false` when the client's bucket is empty; a rejection
    /// consumes nothing.
    pub fn admit(&self, client: &str) -> bool {
        self.admit_at(client, Instant::now())
    }

    /// [`admit`](Self::admit) with an explicit clock value
    pub fn admit_at(&self, client: &str, now: Instant) -> bool {
        let mut buckets = self.table();

        if let Some(bucket) = buckets.get_mut(client) {
            bucket.refill(now, &self.scale);
            return bucket.try_consume(&self.scale);
        }

        let mut bucket = Bucket::full(&self.scale, now);
        let admitted = bucket.try_consume(&self.scale);
        buckets.insert(client.to_string(), bucket);
        admitted
    }

    /// Remove buckets idle for longer than the configured idle timeout
    ///
    /// Returns the number of evicted buckets.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// [`evict_idle`](Self::evict_idle) with an explicit clock value
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut buckets = self.table();
        let before = buckets.len();
        let idle_timeout = self.config.idle_timeout;

        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= idle_timeout);

        before - buckets.len()
    }

    /// Whether a bucket exists for `client`
    pub fn is_tracked(&self, client: &str) -> bool {
        self.table().contains_key(client)
    }

    /// Tokens currently held by `client`'s bucket, without refilling
    pub fn available_tokens(&self, client: &str) -> Option<f64> {
        let per_token = self.scale.per_token as f64;
        self.table().get(client).map(|b| b.units as f64 / per_token)
    }

    /// Get current number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.table().len()
    }
}

/// Handle to the background eviction sweep
///
/// Dropping the handle does not stop the task; call [`SweeperHandle::shutdown`].
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }

    /// Whether the sweep task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the periodic eviction sweep for `controller`
///
/// The task holds only a weak reference and exits on its own once the
/// controller has been dropped. Must be called from within a tokio runtime.
pub fn spawn_sweeper(controller: &Arc<AdmissionController>) -> SweeperHandle {
    let weak: Weak<AdmissionController> = Arc::downgrade(controller);
    let period = controller.config.sweep_interval;
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs = period.as_secs(), "Starting bucket eviction sweep");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(controller) = weak.upgrade() else {
                        debug!("Admission controller dropped, stopping sweep");
                        break;
                    };
                    let evicted = controller.evict_idle();
                    if evicted > 0 {
                        debug!(
                            evicted,
                            remaining = controller.tracked_clients(),
                            "Evicted idle rate limit buckets"
                        );
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Bucket eviction sweep stopped");
    });

    SweeperHandle {
        shutdown_tx,
        handle,
    }
}
