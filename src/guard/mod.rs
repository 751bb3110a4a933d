//! Per-client admission control using a sliding window.

use crate::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Counts admissions per client key inside a trailing window.
///
/// Each check-and-record happens under one lock, so concurrent callers can
/// never over- or under-admit.
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests as usize,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// `None` when rate limiting is disabled
    pub fn from_config(config: &RateLimitConfig) -> Option<Arc<Self>> {
        config
            .enabled
            .then(|| Arc::new(Self::new(config.max_requests, config.window())))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an admission for `client_key` if it is under its bound
    pub fn admit(&self, client_key: &str) -> bool {
        self.admit_at(client_key, Instant::now())
    }

    fn admit_at(&self, client_key: &str, now: Instant) -> bool {
        let mut clients = self.lock();
        let hits = clients.entry(client_key.to_string()).or_default();
        evict(hits, now, self.window);

        if hits.len() >= self.max_requests {
            debug!("Rejecting {}: {} admissions in window", client_key, hits.len());
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Drop clients with no admissions left in the window; returns how many
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, hits| {
            evict(hits, now, self.window);
            !hits.is_empty()
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Periodically sweep idle clients until `shutdown` fires
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!(
                                "Evicted {} idle clients from rate limiter ({} tracked)",
                                removed,
                                limiter.tracked_clients()
                            );
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        // Counters stay consistent even if a holder panicked mid-update
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn evict(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = hits.front() {
        if now.saturating_duration_since(oldest) >= window {
            hits.pop_front();
        } else {
            break;
        }
    }
}
