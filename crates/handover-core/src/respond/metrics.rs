//! Responder counters for the admin stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters updated by the responder pipeline.
///
/// Injected into the responder rather than global, so tests get their
/// own instance. All loads/stores are relaxed; exact cross-counter
/// consistency is not needed for a dashboard.
#[derive(Debug, Default)]
pub struct ResponderMetrics {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    provider_successes: AtomicU64,
    provider_failures: AtomicU64,
    fallbacks: AtomicU64,
}

impl ResponderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_success(&self) {
        self.provider_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let successes = self.provider_successes.load(Ordering::Relaxed);
        let fallbacks = self.fallbacks.load(Ordering::Relaxed);

        let rate = |n: u64| {
            if total == 0 {
                0.0
            } else {
                (n as f64 / total as f64) * 100.0
            }
        };

        MetricsSnapshot {
            total_requests: total,
            cache_hits,
            provider_successes: successes,
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            fallbacks,
            cache_hit_rate: rate(cache_hits),
            success_rate: rate(successes),
            fallback_rate: rate(fallbacks),
        }
    }
}

/// Point-in-time responder statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub provider_successes: u64,
    pub provider_failures: u64,
    pub fallbacks: u64,
    pub cache_hit_rate: f64,
    pub success_rate: f64,
    pub fallback_rate: f64,
}
