//! Metrics collection for module graph resolution.
//!
//! The graph records cache traffic and lazy-build work through an injected
//! collector. The default is a no-op so production pays nothing unless an
//! observer is wired in; tests use [`CounterMetrics`] to assert on cache
//! behavior.

use std::sync::atomic::{AtomicU64, Ordering};

/// Observer for module graph activity.
///
/// All methods have no-op defaults.
pub trait MetricsCollector: Send + Sync {
    /// A transitive cache lookup was answered from the cache.
    fn record_cache_hit(&self) {}

    /// A transitive cache lookup required recomputation.
    fn record_cache_miss(&self) {}

    /// A transitive cache entry was evicted by an edge insertion.
    fn record_cache_eviction(&self) {}

    /// The lazy builder parsed a module.
    fn record_module_parsed(&self) {}
}

/// The default collector: records nothing.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {}

/// Counting collector for tests and diagnostics.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    modules_parsed: AtomicU64,
}

impl CounterMetrics {
    /// Create a zeroed collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache hits recorded so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Cache misses recorded so far.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Evictions recorded so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Modules parsed by the lazy builder so far.
    pub fn modules_parsed(&self) -> u64 {
        self.modules_parsed.load(Ordering::Relaxed)
    }

    /// Hit rate in [0.0, 1.0]; zero when nothing was recorded.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

impl MetricsCollector for CounterMetrics {
    fn record_cache_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_module_parsed(&self) {
        self.modules_parsed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = CounterMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_eviction();
        metrics.record_module_parsed();

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert_eq!(metrics.evictions(), 1);
        assert_eq!(metrics.modules_parsed(), 1);
        assert!((metrics.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hit_rate_is_zero_when_empty() {
        let metrics = CounterMetrics::new();
        assert_eq!(metrics.hit_rate(), 0.0);
    }
}
