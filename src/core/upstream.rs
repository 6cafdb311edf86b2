//! In-memory state for a single upstream inference server.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Rolling window size for success/latency samples, bounded so the router's
/// memory footprint does not grow with uptime.
const ROLLING_WINDOW: usize = 50;

#[derive(Debug, Clone, Default)]
struct LoadState {
    running: u64,
    waiting: u64,
    gpu_cache_usage_perc: f64,
    last_scrape_at: Option<DateTime<Utc>>,
    scrape_ok: bool,
}

#[derive(Debug)]
struct MutableState {
    healthy_since: Option<DateTime<Utc>>,
    unhealthy_since: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    outcomes: VecDeque<bool>,
    latencies_ms: VecDeque<f64>,
    recovering_since: Option<Instant>,
    load: LoadState,
    models: HashSet<String>,
    last_discovery_at: Option<DateTime<Utc>>,
}

impl Default for MutableState {
    fn default() -> Self {
        Self {
            healthy_since: None,
            unhealthy_since: Some(Utc::now()),
            consecutive_failures: 0,
            outcomes: VecDeque::with_capacity(ROLLING_WINDOW),
            latencies_ms: VecDeque::with_capacity(ROLLING_WINDOW),
            recovering_since: None,
            load: LoadState::default(),
            models: HashSet::new(),
            last_discovery_at: None,
        }
    }
}

/// A single configured backend, with its declared capacity and all state
/// scraped, probed, or forwarded against it.
///
/// Identity (`url`, `max_concurrent_requests`) is fixed at construction time;
/// everything else lives behind a per-upstream lock so readers never block
/// on unrelated upstreams.
#[derive(Debug)]
pub struct Upstream {
    url: String,
    max_concurrent_requests: AtomicU32,
    healthy: AtomicBool,
    state: Mutex<MutableState>,
}

/// A point-in-time, by-value copy of an upstream's state, safe to hand to
/// handlers and the selector without holding any lock.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpstreamSnapshot {
    pub url: String,
    pub max_concurrent_requests: u32,
    pub healthy: bool,
    pub running: u64,
    pub waiting: u64,
    pub gpu_cache_usage_perc: f64,
    pub scrape_ok: bool,
    pub last_scrape_at: Option<DateTime<Utc>>,
    pub success_rate: f64,
    pub mean_response_time_ms: f64,
    #[serde(skip)]
    pub models: HashSet<String>,
}

impl UpstreamSnapshot {
    pub fn available_capacity(&self) -> i64 {
        (self.max_concurrent_requests as i64 - self.running as i64).max(0)
    }

    pub fn score(&self) -> f64 {
        if self.max_concurrent_requests == 0 {
            return f64::INFINITY;
        }
        (self.running as f64 + 0.5 * self.waiting as f64) / self.max_concurrent_requests as f64
    }
}

impl Upstream {
    pub fn new(url: String, max_concurrent_requests: u32) -> Self {
        Self {
            url,
            max_concurrent_requests: AtomicU32::new(max_concurrent_requests),
            healthy: AtomicBool::new(false),
            state: Mutex::new(MutableState::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn max_concurrent_requests(&self) -> u32 {
        self.max_concurrent_requests.load(Ordering::Relaxed)
    }

    /// Update the declared capacity in place, used on config reload when an
    /// existing upstream's tuning changed but its identity did not.
    pub fn set_max_concurrent_requests(&self, value: u32) {
        self.max_concurrent_requests.store(value, Ordering::Relaxed);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn mark_healthy(&self) {
        if !self.healthy.swap(true, Ordering::AcqRel) {
            let mut state = self.state.lock();
            state.healthy_since = Some(Utc::now());
            state.unhealthy_since = None;
            state.recovering_since = None;
        }
    }

    pub fn mark_unhealthy(&self) {
        if self.healthy.swap(false, Ordering::AcqRel) {
            let mut state = self.state.lock();
            state.unhealthy_since = Some(Utc::now());
            state.healthy_since = None;
            state.recovering_since = None;
        }
    }

    /// Record the outcome of a probe or a forwarded request.
    pub fn record_outcome(&self, success: bool, latency_ms: Option<f64>) {
        let mut state = self.state.lock();
        if state.outcomes.len() == ROLLING_WINDOW {
            state.outcomes.pop_front();
        }
        state.outcomes.push_back(success);

        if let Some(latency) = latency_ms {
            if state.latencies_ms.len() == ROLLING_WINDOW {
                state.latencies_ms.pop_front();
            }
            state.latencies_ms.push_back(latency);
        }

        if success {
            state.consecutive_failures = 0;
            if state.recovering_since.is_none() && !self.is_healthy() {
                state.recovering_since = Some(Instant::now());
            }
        } else {
            state.consecutive_failures += 1;
            state.recovering_since = None;
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn success_rate(&self) -> f64 {
        let state = self.state.lock();
        if state.outcomes.is_empty() {
            return 1.0;
        }
        let successes = state.outcomes.iter().filter(|ok| **ok).count();
        successes as f64 / state.outcomes.len() as f64
    }

    pub fn mean_response_time_ms(&self) -> f64 {
        let state = self.state.lock();
        if state.latencies_ms.is_empty() {
            return 0.0;
        }
        state.latencies_ms.iter().sum::<f64>() / state.latencies_ms.len() as f64
    }

    /// Seconds of sustained successful probing since the last failure,
    /// or `None` if a failure is the most recent outcome.
    pub fn recovering_for(&self) -> Option<std::time::Duration> {
        self.state.lock().recovering_since.map(|since| since.elapsed())
    }

    pub fn set_load(&self, running: u64, waiting: u64, gpu_cache_usage_perc: f64) {
        let mut state = self.state.lock();
        state.load.running = running;
        state.load.waiting = waiting;
        state.load.gpu_cache_usage_perc = gpu_cache_usage_perc;
        state.load.scrape_ok = true;
        state.load.last_scrape_at = Some(Utc::now());
    }

    pub fn mark_scrape_failed(&self) {
        let mut state = self.state.lock();
        state.load.scrape_ok = false;
    }

    pub fn set_models(&self, models: HashSet<String>) {
        let mut state = self.state.lock();
        state.models = models;
        state.last_discovery_at = Some(Utc::now());
    }

    pub fn serves_model(&self, model: &str) -> bool {
        self.state.lock().models.contains(model)
    }

    pub fn models(&self) -> HashSet<String> {
        self.state.lock().models.clone()
    }

    pub fn snapshot(&self) -> UpstreamSnapshot {
        let state = self.state.lock();
        UpstreamSnapshot {
            url: self.url.clone(),
            max_concurrent_requests: self.max_concurrent_requests(),
            healthy: self.is_healthy(),
            running: state.load.running,
            waiting: state.load.waiting,
            gpu_cache_usage_perc: state.load.gpu_cache_usage_perc,
            scrape_ok: state.load.scrape_ok,
            last_scrape_at: state.load.last_scrape_at,
            success_rate: {
                drop(state);
                self.success_rate()
            },
            mean_response_time_ms: self.mean_response_time_ms(),
            models: self.models(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_upstream_starts_unhealthy() {
        let up = Upstream::new("http://a".into(), 8);
        assert!(!up.is_healthy());
    }

    #[test]
    fn record_outcome_tracks_success_rate() {
        let up = Upstream::new("http://a".into(), 8);
        up.record_outcome(true, Some(10.0));
        up.record_outcome(true, Some(20.0));
        up.record_outcome(false, None);
        assert!((up.success_rate() - (2.0 / 3.0)).abs() < 1e-9);
        assert_eq!(up.consecutive_failures(), 1);
    }

    #[test]
    fn rolling_window_is_bounded() {
        let up = Upstream::new("http://a".into(), 8);
        for _ in 0..(ROLLING_WINDOW * 2) {
            up.record_outcome(true, Some(5.0));
        }
        assert_eq!(up.state.lock().outcomes.len(), ROLLING_WINDOW);
    }

    #[test]
    fn mark_healthy_sets_timestamp_once() {
        let up = Upstream::new("http://a".into(), 8);
        up.mark_healthy();
        assert!(up.is_healthy());
        let first = up.state.lock().healthy_since;
        up.mark_healthy();
        assert_eq!(up.state.lock().healthy_since, first);
    }

    #[test]
    fn score_reflects_capacity() {
        let up = Upstream::new("http://a".into(), 10);
        up.set_load(4, 2, 0.1);
        let snap = up.snapshot();
        assert!((snap.score() - 0.5).abs() < 1e-9);
        assert_eq!(snap.available_capacity(), 6);
    }
}
