//! End-to-end tests for the optimization engine.
//!
//! These exercise the public `optimize` surface: scenario outcomes, response
//! invariants, cache behavior, and concurrent use of a shared engine.

use std::time::Duration;

use sage::prelude::*;
use sage::{CacheConfig, OptimizationType};

fn engine() -> OptimizationEngine {
    OptimizationEngine::with_defaults()
}

fn orders_request() -> OptimizationRequest {
    OptimizationRequest::new("SELECT * FROM orders", "postgresql")
        .with_table_statistics(vec![TableStatistics::new("orders", 500_000)])
        .with_level(OptimizationLevel::Intermediate)
}

fn subquery_request(level: OptimizationLevel) -> OptimizationRequest {
    OptimizationRequest::new(
        "SELECT * FROM orders WHERE customer_id IN (SELECT id FROM customers)",
        "postgresql",
    )
    .with_level(level)
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_unbounded_select_star_scenario() {
    let response = engine().optimize_blocking(&orders_request());
    assert!(response.success);

    let pruned = response
        .optimized_queries
        .iter()
        .find(|c| c.applied_optimizations == [OptimizationType::ProjectionPruning])
        .expect("projection pruning candidate");
    assert!(!pruned.rewritten_query.contains('*'));

    let limited = response
        .optimized_queries
        .iter()
        .find(|c| c.applied_optimizations == [OptimizationType::LimitInjection])
        .expect("limit injection candidate");
    assert!(limited.rewritten_query.ends_with("LIMIT 1000"));

    let plan = response.execution_plan.as_ref().expect("plan analysis");
    assert!(plan.bottlenecks.iter().any(|b| b.contains("SELECT *")));
    assert!(plan.bottlenecks.iter().any(|b| b.contains("sem LIMIT")));

    let analysis = response.cost_analysis.as_ref().expect("cost analysis");
    assert!(analysis.improvement_percentage.expect("improvement") > 0.0);
}

#[test]
fn test_join_without_index_scenario() {
    let request = OptimizationRequest::new("SELECT id FROM a JOIN b ON a.id = b.a_id", "mysql");
    let response = engine().optimize_blocking(&request);
    assert!(response.success);

    assert_eq!(response.suggestions.len(), 1);
    let suggestion = &response.suggestions[0];
    assert!(suggestion.implementation.contains("a_id"));
    assert_eq!(suggestion.impact_score, 0.9);
}

// ============================================================================
// Response Invariant Tests
// ============================================================================

#[test]
fn test_candidates_ordered_by_descending_confidence() {
    let response = engine().optimize_blocking(&subquery_request(OptimizationLevel::Aggressive));
    assert!(response.optimized_queries.len() >= 2);
    for pair in response.optimized_queries.windows(2) {
        assert!(pair[0].confidence >= pair[1].confidence);
    }
}

#[test]
fn test_cost_estimates_are_additive() {
    let response = engine().optimize_blocking(&orders_request());

    let analysis = response.cost_analysis.as_ref().unwrap();
    let mut estimates = vec![&analysis.original_cost];
    if let Some(ref best) = analysis.optimized_cost {
        estimates.push(best);
    }
    estimates.extend(response.optimized_queries.iter().map(|c| &c.cost_estimate));

    for estimate in estimates {
        let sum = estimate.cpu_cost + estimate.io_cost + estimate.network_cost;
        assert!((estimate.total_cost - sum).abs() < 1e-9);
    }
}

#[test]
fn test_risky_rewrite_warning_is_lifted_to_response() {
    let response = engine().optimize_blocking(&subquery_request(OptimizationLevel::Advanced));
    assert!(response.success);
    assert!(response
        .warnings
        .iter()
        .any(|w| w.contains("manual review")));
}

#[test]
fn test_response_statistics_reflect_query_structure() {
    let response = engine().optimize_blocking(&subquery_request(OptimizationLevel::Basic));
    assert_eq!(response.query_statistics.select_count, 2);
    assert_eq!(response.query_statistics.complexity_score, 3);
}

#[test]
fn test_disabled_flags_suppress_sections() {
    let request = orders_request()
        .with_analyze_execution_plan(false)
        .with_generate_alternatives(false)
        .with_estimate_costs(false)
        .with_enabled_types(
            [OptimizationType::ProjectionPruning].into_iter().collect(),
        );

    let response = engine().optimize_blocking(&request);
    assert!(response.success);
    assert!(response.execution_plan.is_none());
    assert!(response.optimized_queries.is_empty());
    assert!(response.cost_analysis.is_none());
    assert!(response.suggestions.is_empty());
}

#[test]
fn test_validation_failure_returns_failed_response() {
    let engine = engine();
    let response = engine.optimize_blocking(&OptimizationRequest::new("   ", "postgresql"));
    assert!(!response.success);
    assert!(response.error_message.unwrap().contains("validation"));

    let zero_budget =
        orders_request().with_max_optimization_time(Duration::ZERO);
    let response = engine.optimize_blocking(&zero_budget);
    assert!(!response.success);
}

// ============================================================================
// Level Gating Tests
// ============================================================================

#[test]
fn test_basic_level_never_converts_subqueries() {
    let response = engine().optimize_blocking(&subquery_request(OptimizationLevel::Basic));
    assert!(response.success);
    assert!(!response.optimized_queries.iter().any(|c| c
        .applied_optimizations
        .contains(&OptimizationType::SubqueryOptimization)));
}

#[test]
fn test_advanced_level_converts_subqueries() {
    let response = engine().optimize_blocking(&subquery_request(OptimizationLevel::Advanced));
    assert!(response
        .optimized_queries
        .iter()
        .any(|c| c.applied_optimizations == [OptimizationType::SubqueryOptimization]));
}

// ============================================================================
// Cache Tests
// ============================================================================

#[test]
fn test_repeated_request_is_served_from_cache() {
    let engine = engine();
    let first = engine.optimize_blocking(&orders_request());
    let second = engine.optimize_blocking(&orders_request());

    // bit-identical, including id and timestamp
    assert_eq!(first, second);
    assert_eq!(engine.cache_stats().hits, 1);
    assert_eq!(engine.metrics().cache_hits, 1);
    assert_eq!(engine.metrics().total_requests, 2);
}

#[test]
fn test_expired_entry_triggers_recomputation() {
    let config = EngineConfig::new()
        .with_cache_config(CacheConfig::new().with_ttl(Duration::from_millis(30)));
    let engine = OptimizationEngine::new(config);

    let first = engine.optimize_blocking(&orders_request());
    std::thread::sleep(Duration::from_millis(60));
    let second = engine.optimize_blocking(&orders_request());

    assert_ne!(first.id, second.id);
    assert_eq!(engine.cache_stats().expirations, 1);
}

#[test]
fn test_policy_change_bypasses_cache() {
    let engine = engine();
    engine.optimize_blocking(&orders_request());
    engine.optimize_blocking(&orders_request().with_level(OptimizationLevel::Advanced));
    assert_eq!(engine.cache_stats().hits, 0);
}

#[test]
fn test_clear_cache_forces_recompute() {
    let engine = engine();
    let first = engine.optimize_blocking(&orders_request());
    engine.clear_cache();
    let second = engine.optimize_blocking(&orders_request());
    assert_ne!(first.id, second.id);
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_async_optimize_matches_blocking() {
    let engine = engine();
    let async_response = engine.optimize(orders_request()).await;
    assert!(async_response.success);

    // the second call hits the cache populated by the first
    let blocking_response = engine.optimize_blocking(&orders_request());
    assert_eq!(async_response, blocking_response);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_state() {
    let engine = engine();
    let warm = engine.optimize(orders_request()).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(
            async move { engine.optimize(orders_request()).await },
        ));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response, warm);
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.total_requests, 9);
    assert_eq!(metrics.cache_hits, 8);
}

#[tokio::test]
async fn test_async_validation_failure() {
    let response = engine()
        .optimize(OptimizationRequest::new("", "postgresql"))
        .await;
    assert!(!response.success);
}

// ============================================================================
// Serialization Tests
// ============================================================================

#[test]
fn test_response_json_round_trip() {
    let response = engine().optimize_blocking(&orders_request());
    let json = serde_json::to_string(&response).unwrap();
    let decoded: OptimizationResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, response);
}
