//! Per-operation timing and cache statistics for catalog reads.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;

/// Whether a call was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
}

#[derive(Debug, Clone, Copy, Default)]
struct OpStats {
    calls: u64,
    hits: u64,
    misses: u64,
    total: Duration,
    max: Duration,
    slow_calls: u64,
}

/// Records latency and hit/miss counts per catalog operation.
///
/// Cheap to clone; clones share the same counters.
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    slow_threshold: Duration,
    stats: Arc<Mutex<HashMap<&'static str, OpStats>>>,
}

impl PerformanceMonitor {
    #[must_use]
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            slow_threshold,
            stats: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one call. Calls slower than the threshold log a warning.
    pub fn record(&self, operation: &'static str, elapsed: Duration, outcome: CacheOutcome) {
        let slow = elapsed > self.slow_threshold;
        if slow {
            tracing::warn!(
                operation,
                elapsed_ms = duration_ms(elapsed),
                threshold_ms = duration_ms(self.slow_threshold),
                cached = outcome == CacheOutcome::Hit,
                "Slow catalog call"
            );
        }

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry(operation).or_default();
        entry.calls += 1;
        match outcome {
            CacheOutcome::Hit => entry.hits += 1,
            CacheOutcome::Miss => entry.misses += 1,
        }
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
        if slow {
            entry.slow_calls += 1;
        }
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let operations = stats
            .iter()
            .map(|(name, s)| ((*name).to_string(), OperationStats::from(*s)))
            .collect();
        PerformanceSnapshot {
            slow_threshold_ms: duration_ms(self.slow_threshold),
            operations,
        }
    }

    /// Drop every counter.
    pub fn reset(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Serializable view of the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub slow_threshold_ms: u64,
    pub operations: BTreeMap<String, OperationStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationStats {
    pub calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub total_ms: u64,
    pub avg_ms: f64,
    pub max_ms: u64,
    pub slow_calls: u64,
}

impl From<OpStats> for OperationStats {
    #[allow(clippy::cast_precision_loss)]
    fn from(s: OpStats) -> Self {
        let (hit_rate, avg_ms) = if s.calls == 0 {
            (0.0, 0.0)
        } else {
            (
                s.hits as f64 / s.calls as f64,
                s.total.as_secs_f64() * 1000.0 / s.calls as f64,
            )
        };
        Self {
            calls: s.calls,
            cache_hits: s.hits,
            cache_misses: s.misses,
            hit_rate,
            total_ms: duration_ms(s.total),
            avg_ms,
            max_ms: duration_ms(s.max),
            slow_calls: s.slow_calls,
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
