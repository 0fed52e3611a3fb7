//! Per-domain token bucket rate limiter for respectful fetching.
//!
//! Each domain gets an independent bucket (capacity 1 by default, so no
//! burst allowance). When a request finds the bucket empty it joins a FIFO
//! waiter queue; a background tick task refills buckets every `waiter_tick`
//! and resumes waiters strictly in enqueue order. The tick task is spawned
//! lazily per domain and exits when its queue drains.
//!
//! robots.txt `Crawl-delay` feeds back through `set_domain_limit`, which
//! rewrites a domain's refill rate to `1 / delay`.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
// tokio's Instant tracks the runtime clock, which keeps refill math correct
// under test-time pause/auto-advance as well as in production.
use tokio::time::Instant;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, trace};

use crate::config::ServiceConfig;
use crate::error::{SiftError, SiftResult};
use crate::utils::host_of;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
    waiters: VecDeque<oneshot::Sender<()>>,
    ticking: bool,
}

impl Bucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
            waiters: VecDeque::new(),
            ticking: false,
        }
    }

    /// Refill proportional to wall-clock elapsed. Invariant: tokens never
    /// exceed capacity.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
            self.last_refill = now;
        }
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Instance-based rate limiter with isolated per-domain buckets.
///
/// Instance-based rather than global so tests can run in parallel without
/// interfering with each other.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, Arc<Mutex<Bucket>>>>,
    enabled: bool,
    capacity: f64,
    default_refill_rps: f64,
    waiter_tick: std::time::Duration,
    max_token_wait: std::time::Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            enabled: config.rate_limit_enabled(),
            capacity: config.bucket_capacity(),
            default_refill_rps: config.default_refill_rps(),
            waiter_tick: config.waiter_tick(),
            max_token_wait: config.max_token_wait(),
        }
    }

    /// Wait until a token is available for the URL's domain.
    ///
    /// Waiters for the same domain resume strictly in call order. Returns
    /// immediately when rate limiting is disabled.
    ///
    /// # Errors
    ///
    /// `InvalidUrl` when the URL has no host; `RateLimitExceeded` when no
    /// token arrives within the configured wait ceiling.
    pub async fn check_limit(&self, url: &str) -> SiftResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let host = host_of(url)?;

        let bucket = self.bucket_for(&host);
        let rx = {
            let mut guard = bucket.lock().await;
            guard.refill(Instant::now());
            if guard.try_consume() {
                trace!(host = %host, tokens = guard.tokens, "token consumed");
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            guard.waiters.push_back(tx);
            if !guard.ticking {
                guard.ticking = true;
                self.spawn_drain_task(host.clone(), Arc::clone(&bucket));
            }
            rx
        };

        match tokio::time::timeout(self.max_token_wait, rx).await {
            Ok(Ok(())) => Ok(()),
            // Sender dropped or wait ceiling hit: the caller is out of luck.
            _ => Err(SiftError::RateLimitExceeded { host }),
        }
    }

    /// Set a domain's refill rate from a robots.txt crawl delay. Values
    /// `<= 0` are ignored.
    pub async fn set_domain_limit(&self, host: &str, crawl_delay_secs: f64) {
        if crawl_delay_secs <= 0.0 {
            return;
        }
        let rate = 1.0 / crawl_delay_secs;
        let bucket = self.bucket_for(&host.to_lowercase());
        let mut guard = bucket.lock().await;
        guard.refill_rate = rate;
        debug!(host, rate, "domain refill rate updated from crawl delay");
    }

    /// Number of domains currently tracked.
    #[must_use]
    pub fn tracked_domains(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_for(&self, host: &str) -> Arc<Mutex<Bucket>> {
        Arc::clone(
            self.buckets
                .entry(host.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(Bucket::new(
                        self.capacity,
                        self.default_refill_rps,
                    )))
                })
                .value(),
        )
    }

    /// Background drain loop: refill, then hand tokens to waiters in FIFO
    /// order. Exits once the queue is empty.
    fn spawn_drain_task(&self, host: String, bucket: Arc<Mutex<Bucket>>) {
        let tick = self.waiter_tick;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let mut guard = bucket.lock().await;
                guard.refill(Instant::now());
                while guard.tokens >= 1.0 {
                    match guard.waiters.pop_front() {
                        Some(waiter) => {
                            guard.tokens -= 1.0;
                            // A dropped receiver means the caller gave up;
                            // the token goes back.
                            if waiter.send(()).is_err() {
                                guard.tokens += 1.0;
                            }
                        }
                        None => break,
                    }
                }
                if guard.waiters.is_empty() {
                    guard.ticking = false;
                    trace!(host = %host, "waiter queue drained, stopping tick");
                    break;
                }
            }
        });
    }
}
