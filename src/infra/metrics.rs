//! Lock-free lookup counters
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Which proxy endpoint a counter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Geocode,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Search => "search",
            Endpoint::Geocode => "geocode",
        }
    }
}

#[derive(Default)]
struct EndpointCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    not_found: AtomicU64,
    upstream_errors: AtomicU64,
}

impl EndpointCounters {
    fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub not_found: u64,
    pub upstream_errors: u64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub uptime_secs: u64,
    pub search: EndpointSnapshot,
    pub geocode: EndpointSnapshot,
    /// Client lookups only; the proxy never serves the mock record
    pub mock_fallbacks: u64,
    pub bad_requests: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            uptime_secs = self.uptime_secs,
            search_requests = self.search.requests,
            search_cache_hits = self.search.cache_hits,
            search_not_found = self.search.not_found,
            search_upstream_errors = self.search.upstream_errors,
            geocode_requests = self.geocode.requests,
            geocode_cache_hits = self.geocode.cache_hits,
            geocode_not_found = self.geocode.not_found,
            geocode_upstream_errors = self.geocode.upstream_errors,
            mock_fallbacks = self.mock_fallbacks,
            bad_requests = self.bad_requests,
            "metrics_summary"
        );
    }
}

pub struct Metrics {
    started: Instant,
    search: EndpointCounters,
    geocode: EndpointCounters,
    mock_fallbacks: AtomicU64,
    bad_requests: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            search: EndpointCounters::default(),
            geocode: EndpointCounters::default(),
            mock_fallbacks: AtomicU64::new(0),
            bad_requests: AtomicU64::new(0),
        }
    }

    fn counters(&self, endpoint: Endpoint) -> &EndpointCounters {
        match endpoint {
            Endpoint::Search => &self.search,
            Endpoint::Geocode => &self.geocode,
        }
    }

    #[inline]
    pub fn record_request(&self, endpoint: Endpoint) {
        self.counters(endpoint).requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cache_hit(&self, endpoint: Endpoint) {
        self.counters(endpoint).cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_not_found(&self, endpoint: Endpoint) {
        self.counters(endpoint).not_found.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_upstream_error(&self, endpoint: Endpoint) {
        self.counters(endpoint).upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_mock_fallback(&self) {
        self.mock_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsSummary {
        MetricsSummary {
            uptime_secs: self.started.elapsed().as_secs(),
            search: self.search.snapshot(),
            geocode: self.geocode.snapshot(),
            mock_fallbacks: self.mock_fallbacks.load(Ordering::Relaxed),
            bad_requests: self.bad_requests.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_endpoint() {
        let metrics = Metrics::new();
        metrics.record_request(Endpoint::Search);
        metrics.record_request(Endpoint::Search);
        metrics.record_cache_hit(Endpoint::Search);
        metrics.record_not_found(Endpoint::Geocode);
        metrics.record_bad_request();

        let summary = metrics.report();
        assert_eq!(summary.search.requests, 2);
        assert_eq!(summary.search.cache_hits, 1);
        assert_eq!(summary.geocode.requests, 0);
        assert_eq!(summary.geocode.not_found, 1);
        assert_eq!(summary.bad_requests, 1);
        assert_eq!(summary.mock_fallbacks, 0);
    }
}
