//! Linear cost model over query complexity and table statistics.
//!
//! CPU cost scales with structural complexity, IO with the number of rows
//! the query can touch, network with both. The weight table is swappable so
//! callers can tune the model without changing any of the estimate
//! consumers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::QueryStatistics;
use crate::model::TableStatistics;

/// Tunable weights for [`CostModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    /// Cost units per complexity point
    pub cpu_weight: f64,
    /// Rows per IO cost unit
    pub io_rows_per_unit: f64,
    /// Divisor applied to complexity x rows for network cost
    pub network_divisor: f64,
    /// Estimated memory footprint per row
    pub bytes_per_row: u64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cpu_weight: 100.0,
            io_rows_per_unit: 100.0,
            network_divisor: 10_000.0,
            bytes_per_row: 50,
        }
    }
}

impl CostWeights {
    pub fn with_cpu_weight(mut self, weight: f64) -> Self {
        self.cpu_weight = weight;
        self
    }

    pub fn with_io_rows_per_unit(mut self, rows: f64) -> Self {
        self.io_rows_per_unit = rows;
        self
    }

    pub fn with_network_divisor(mut self, divisor: f64) -> Self {
        self.network_divisor = divisor;
        self
    }

    pub fn with_bytes_per_row(mut self, bytes: u64) -> Self {
        self.bytes_per_row = bytes;
        self
    }
}

/// Model-derived cost prediction for executing a query.
///
/// `total_cost` is always the sum of the three components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub cpu_cost: f64,
    pub io_cost: f64,
    pub network_cost: f64,
    pub total_cost: f64,
    /// Predicted wall-clock execution time
    pub estimated_duration: Duration,
    /// Predicted peak memory footprint
    pub estimated_memory_bytes: u64,
}

impl CostEstimate {
    /// An all-zero estimate, used when nothing is known about the query.
    pub fn zero() -> Self {
        Self {
            cpu_cost: 0.0,
            io_cost: 0.0,
            network_cost: 0.0,
            total_cost: 0.0,
            estimated_duration: Duration::ZERO,
            estimated_memory_bytes: 0,
        }
    }
}

/// Converts structural statistics plus table statistics into a
/// [`CostEstimate`].
#[derive(Debug, Clone, Default)]
pub struct CostModel {
    weights: CostWeights,
}

impl CostModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: CostWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Estimate the cost of a raw query string.
    pub fn estimate(&self, query: &str, tables: &[TableStatistics]) -> CostEstimate {
        let statistics = QueryStatistics::collect(query);
        self.estimate_collected(&statistics, tables)
    }

    /// Estimate from already-collected statistics.
    ///
    /// Row volume is the sum of all supplied tables' row counts, capped at
    /// the query's LIMIT when one is present. The cap is what makes a
    /// LIMIT-injected rewrite measurably cheaper than its original.
    pub fn estimate_collected(
        &self,
        statistics: &QueryStatistics,
        tables: &[TableStatistics],
    ) -> CostEstimate {
        let total_rows: u64 = tables.iter().map(|t| t.row_count).sum();
        let effective_rows = match statistics.limit_value {
            Some(limit) => total_rows.min(limit),
            None => total_rows,
        };

        let complexity = statistics.complexity_score as f64;
        let cpu_cost = complexity * self.weights.cpu_weight;
        let io_cost = effective_rows as f64 / self.weights.io_rows_per_unit;
        let network_cost = complexity * effective_rows as f64 / self.weights.network_divisor;
        let total_cost = cpu_cost + io_cost + network_cost;

        CostEstimate {
            cpu_cost,
            io_cost,
            network_cost,
            total_cost,
            estimated_duration: Duration::from_millis(total_cost as u64),
            estimated_memory_bytes: effective_rows.saturating_mul(self.weights.bytes_per_row),
        }
    }
}
