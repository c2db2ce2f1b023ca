//! Aggregate metrics across all engine invocations.
//!
//! One recorder is shared by every caller of an engine instance. Counters
//! only ever grow (except via [`MetricsRecorder::reset`]); snapshots are
//! cheap clones an observability collaborator can poll.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{OptimizationResponse, OptimizationType};

/// Upper bounds, in milliseconds, of the latency histogram buckets. A final
/// unbounded bucket catches everything slower.
const LATENCY_BUCKET_BOUNDS_MS: [u64; 6] = [1, 5, 10, 50, 100, 500];

/// One latency histogram bucket. `upper_bound_ms` is `None` for the
/// overflow bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBucket {
    pub upper_bound_ms: Option<u64>,
    pub count: u64,
}

/// Point-in-time view of the recorder's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub timeouts: u64,
    /// How many times each optimization type was applied or suggested
    pub applied_optimizations: BTreeMap<OptimizationType, u64>,
    pub latency_buckets: Vec<LatencyBucket>,
    pub total_latency: Duration,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        let mut latency_buckets: Vec<LatencyBucket> = LATENCY_BUCKET_BOUNDS_MS
            .iter()
            .map(|&bound| LatencyBucket {
                upper_bound_ms: Some(bound),
                count: 0,
            })
            .collect();
        latency_buckets.push(LatencyBucket {
            upper_bound_ms: None,
            count: 0,
        });

        Self {
            total_requests: 0,
            successes: 0,
            failures: 0,
            cache_hits: 0,
            timeouts: 0,
            applied_optimizations: BTreeMap::new(),
            latency_buckets,
            total_latency: Duration::ZERO,
        }
    }
}

impl MetricsSnapshot {
    /// Fraction of requests that completed successfully.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_requests as f64
        }
    }

    /// Mean latency over all recorded requests.
    pub fn average_latency(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            self.total_latency / self.total_requests as u32
        }
    }
}

/// Thread-safe metrics accumulator.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: RwLock<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished optimization. Called on every request, including
    /// failures and cache hits.
    pub fn record(&self, response: &OptimizationResponse, cache_hit: bool, timed_out: bool) {
        let mut inner = self.inner.write();

        inner.total_requests += 1;
        if response.success {
            inner.successes += 1;
        } else {
            inner.failures += 1;
        }
        if cache_hit {
            inner.cache_hits += 1;
        }
        if timed_out {
            inner.timeouts += 1;
        }

        let applied = response
            .optimized_queries
            .iter()
            .flat_map(|candidate| candidate.applied_optimizations.iter().copied())
            .chain(response.suggestions.iter().map(|s| s.suggestion_type));
        for ty in applied {
            *inner.applied_optimizations.entry(ty).or_insert(0) += 1;
        }

        let elapsed = response.optimization_time;
        inner.total_latency += elapsed;
        let millis = elapsed.as_millis() as u64;
        let slot = LATENCY_BUCKET_BOUNDS_MS
            .iter()
            .position(|&bound| millis <= bound)
            .unwrap_or(LATENCY_BUCKET_BOUNDS_MS.len());
        inner.latency_buckets[slot].count += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().clone()
    }

    /// Zero all counters.
    pub fn reset(&self) {
        *self.inner.write() = MetricsSnapshot::default();
    }
}
