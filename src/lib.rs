//! Sage - Cost-Based SQL Query Optimization Engine
//!
//! Sage analyzes raw SQL statements against externally supplied table and
//! index statistics and produces rewrite candidates, index suggestions, a
//! simulated execution plan, and a cost comparison, all within a bounded
//! time budget and behind a fingerprint-keyed response cache.
//!
//! # Features
//!
//! - **Policy-gated rewrites**: projection pruning, LIMIT injection, and
//!   subquery-to-join conversion, each an independent candidate with its
//!   own confidence score
//! - **Index advice**: uncovered WHERE and JOIN predicate columns become
//!   `CREATE INDEX` suggestions
//! - **Plan analysis**: a synthesized operator tree with per-node costs and
//!   bottleneck detection
//! - **Shared-engine concurrency**: one engine instance serves many callers
//!   over a bounded worker pool, with a shared cache and metrics recorder
//!
//! # Quick Start
//!
//! ```rust
//! use sage::prelude::*;
//!
//! let engine = OptimizationEngine::with_defaults();
//!
//! let request = OptimizationRequest::new("SELECT * FROM orders", "postgresql")
//!     .with_table_statistics(vec![TableStatistics::new("orders", 500_000)]);
//!
//! let response = engine.optimize_blocking(&request);
//! assert!(response.success);
//! println!("{}", response.summary());
//! ```

pub mod cache;
pub mod collector;
pub mod cost;
pub mod error;
pub mod index_advisor;
pub mod metrics;
pub mod model;
pub mod plan;
pub mod rewriter;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheStats, OptimizationCache};
pub use collector::QueryStatistics;
pub use cost::{CostEstimate, CostModel, CostWeights};
pub use error::{Result, SageError};
pub use index_advisor::IndexAdvisor;
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use model::{
    ColumnStatistics, CostAnalysis, Difficulty, IndexInformation, OptimizationLevel,
    OptimizationRequest, OptimizationResponse, OptimizationSuggestion, OptimizationType,
    OptimizedQuery, TableStatistics,
};
pub use plan::{ExecutionPlanAnalysis, PlanAnalyzer, PlanNode, PlanNodeType};
pub use rewriter::QueryRewriter;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Warning attached to responses whose time budget ran out before all
/// requested steps could run.
const BUDGET_EXCEEDED_WARNING: &str =
    "Optimization time budget exceeded; remaining steps were skipped";

/// Configuration options for an [`OptimizationEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of optimizations running concurrently
    pub max_concurrency: usize,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Cost model weight table
    pub cost_weights: CostWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            cache: CacheConfig::default(),
            cost_weights: CostWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size.
    ///
    /// # Panics
    /// Panics if `max_concurrency` is 0.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        assert!(max_concurrency > 0, "max_concurrency must be at least 1");
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the cache configuration.
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the cost model weights.
    pub fn with_cost_weights(mut self, weights: CostWeights) -> Self {
        self.cost_weights = weights;
        self
    }
}

/// Cost-based SQL optimization engine.
///
/// The engine is the main entry point. One instance owns the response cache,
/// the metrics recorder, and the sub-components, and is shared across
/// callers: cloning the engine clones a cheap handle to the same state.
///
/// [`OptimizationEngine::optimize`] never returns an error: validation
/// failures, sub-component failures, and worker problems all surface as a
/// response with `success == false` and a descriptive message.
#[derive(Clone)]
pub struct OptimizationEngine {
    inner: Arc<EngineInner>,
    semaphore: Arc<Semaphore>,
}

struct EngineInner {
    config: EngineConfig,
    cache: OptimizationCache,
    metrics: MetricsRecorder,
    cost_model: CostModel,
    rewriter: QueryRewriter,
    index_advisor: IndexAdvisor,
    plan_analyzer: PlanAnalyzer,
}

impl OptimizationEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        let cost_model = CostModel::with_weights(config.cost_weights.clone());
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        let inner = EngineInner {
            cache: OptimizationCache::new(config.cache.clone()),
            metrics: MetricsRecorder::new(),
            plan_analyzer: PlanAnalyzer::with_model(cost_model.clone()),
            rewriter: QueryRewriter::new(),
            index_advisor: IndexAdvisor::new(),
            cost_model,
            config,
        };

        Self {
            inner: Arc::new(inner),
            semaphore,
        }
    }

    /// Create an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Run an optimization on the caller's thread.
    pub fn optimize_blocking(&self, request: &OptimizationRequest) -> OptimizationResponse {
        self.inner.run(request)
    }

    /// Run an optimization on the engine's worker pool.
    ///
    /// The caller's task is never blocked: the request waits for a worker
    /// permit (bounded by the request's time budget) and then runs via
    /// [`tokio::task::spawn_blocking`].
    #[instrument(skip(self, request))]
    pub async fn optimize(&self, request: OptimizationRequest) -> OptimizationResponse {
        let started = Instant::now();

        let permit = match tokio::time::timeout(
            request.max_optimization_time,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                let err = SageError::internal("engine worker pool is shut down");
                return self.inner.fail(&request.query, err, started, false);
            }
            Err(_) => {
                warn!(query = %request.query, "timed out waiting for an optimization worker");
                let err = SageError::computation(
                    "time budget exceeded while waiting for an optimization worker",
                );
                return self.inner.fail(&request.query, err, started, true);
            }
        };

        let inner = Arc::clone(&self.inner);
        let query = request.query.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            inner.run(&request)
        });

        match handle.await {
            Ok(response) => response,
            Err(join_error) => {
                let err = SageError::computation(format!(
                    "optimization worker failed: {}",
                    join_error
                ));
                self.inner.fail(&query, err, started, false)
            }
        }
    }

    /// Statistics of the shared response cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Snapshot of the shared metrics recorder.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Drop all cached responses.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}

impl Default for OptimizationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl EngineInner {
    /// The synchronous core: validate, consult the cache, run the enabled
    /// sub-components, assemble, cache, and record.
    fn run(&self, request: &OptimizationRequest) -> OptimizationResponse {
        let started = Instant::now();

        if let Err(err) = request.validate() {
            warn!(query = %request.query, %err, "rejected invalid optimization request");
            return self.fail(&request.query, err, started, false);
        }

        let key = request.fingerprint();
        if let Some(cached) = self.cache.get(key) {
            debug!(fingerprint = key, "optimization cache hit");
            self.metrics.record(&cached, true, false);
            return cached;
        }

        let mut gate = BudgetGate::new(started, request.max_optimization_time);
        let statistics = QueryStatistics::collect(&request.query);

        let mut response = OptimizationResponse::empty(&request.query);
        response.query_statistics = statistics.clone();

        if request.analyze_execution_plan && gate.check() {
            response.execution_plan = Some(
                self.plan_analyzer
                    .analyze(&request.query, &request.table_statistics),
            );
        }

        if request.generate_alternatives && gate.check() {
            response.optimized_queries =
                self.rewriter.rewrite(request, &statistics, &self.cost_model);
        }

        if request.enabled_types.contains(&OptimizationType::IndexOptimization) && gate.check() {
            response.suggestions = self.index_advisor.suggest_indexes(
                &request.query,
                &request.table_statistics,
                &request.indexes,
            );
        }

        if request.estimate_costs && gate.check() {
            let original = self
                .cost_model
                .estimate_collected(&statistics, &request.table_statistics);
            response.cost_analysis =
                Some(CostAnalysis::compare(original, &response.optimized_queries));
        }

        self.assemble(&mut response, gate.exceeded());
        response.optimization_time = started.elapsed();

        self.cache.put(key, &response);
        self.metrics.record(&response, false, gate.exceeded());

        info!(
            query = %request.query,
            candidates = response.optimized_queries.len(),
            suggestions = response.suggestions.len(),
            elapsed_ms = response.optimization_time.as_millis() as u64,
            "optimization complete"
        );
        response
    }

    /// Order candidates, lift candidate warnings to the response, and append
    /// the budget advisory when applicable.
    fn assemble(&self, response: &mut OptimizationResponse, budget_exceeded: bool) {
        response.optimized_queries.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let candidate_warnings: Vec<String> = response
            .optimized_queries
            .iter()
            .flat_map(|c| c.warnings.iter().cloned())
            .collect();
        for warning in candidate_warnings {
            if !response.warnings.contains(&warning) {
                response.warnings.push(warning);
            }
        }

        if budget_exceeded {
            warn!("optimization exceeded its time budget, returning partial results");
            response.warnings.push(BUDGET_EXCEEDED_WARNING.to_string());
        }
    }

    /// Build, record, and return a failed response.
    fn fail(
        &self,
        query: &str,
        err: SageError,
        started: Instant,
        timed_out: bool,
    ) -> OptimizationResponse {
        let mut response = OptimizationResponse::failed(query, err.to_string());
        response.optimization_time = started.elapsed();
        self.metrics.record(&response, false, timed_out);
        response
    }
}

/// Cooperative time budget guard. Sub-components are never interrupted
/// mid-computation; the budget is only consulted between them, and once
/// exceeded every later step is skipped.
struct BudgetGate {
    started: Instant,
    budget: Duration,
    exceeded: bool,
}

impl BudgetGate {
    fn new(started: Instant, budget: Duration) -> Self {
        Self {
            started,
            budget,
            exceeded: false,
        }
    }

    /// Whether the next step may run.
    fn check(&mut self) -> bool {
        if self.exceeded {
            return false;
        }
        if self.started.elapsed() > self.budget {
            self.exceeded = true;
            return false;
        }
        true
    }

    fn exceeded(&self) -> bool {
        self.exceeded
    }
}

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::error::{Result, SageError};
    pub use crate::model::{
        ColumnStatistics, IndexInformation, OptimizationLevel, OptimizationRequest,
        OptimizationResponse, OptimizationType, TableStatistics,
    };
    pub use crate::{EngineConfig, OptimizationEngine};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_with_defaults() {
        let engine = OptimizationEngine::with_defaults();
        assert_eq!(engine.config().max_concurrency, 8);
        assert!(engine.cache_stats().hits == 0);
    }

    #[test]
    fn test_validation_failure_is_a_failed_response() {
        let engine = OptimizationEngine::with_defaults();
        let request = OptimizationRequest::new("", "postgresql");

        let response = engine.optimize_blocking(&request);
        assert!(!response.success);
        assert!(response
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("validation"));
        assert_eq!(engine.metrics().failures, 1);
    }

    #[test]
    fn test_budget_gate_skips_after_exhaustion() {
        let started = Instant::now() - Duration::from_secs(5);
        let mut gate = BudgetGate::new(started, Duration::from_secs(1));
        assert!(!gate.check());
        assert!(!gate.check());
        assert!(gate.exceeded());
    }

    #[test]
    fn test_budget_gate_allows_within_budget() {
        let mut gate = BudgetGate::new(Instant::now(), Duration::from_secs(60));
        assert!(gate.check());
        assert!(!gate.exceeded());
    }
}
