//! Policy-gated textual rewrite rules.
//!
//! Each rule is an independent candidate generator: it either produces one
//! standalone rewrite of the original query or nothing. Rules are gated by
//! the request's optimization level and enabled-type set, and never chain:
//! two firing rules yield two candidates, not one combined SQL string.
//!
//! Rewrites are textual substitutions over the raw SQL, not AST transforms.
//! The subquery conversion in particular can produce SQL that needs manual
//! review, and says so in its warnings.

use crate::collector::QueryStatistics;
use crate::cost::CostModel;
use crate::model::{OptimizationLevel, OptimizationRequest, OptimizationType, OptimizedQuery};

/// Default row cap appended by the limit-injection rule.
pub const DEFAULT_INJECTED_LIMIT: u64 = 1000;

/// Maximum number of columns substituted for `SELECT *`.
const MAX_PROJECTION_COLUMNS: usize = 5;

/// Column list used when no table statistics are supplied.
const FALLBACK_PROJECTION: &str = "id, name, created_at";

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// Applies all built-in rewrite rules to a request.
pub struct QueryRewriter {
    rules: Vec<Box<dyn RewriteRule + Send + Sync>>,
}

impl QueryRewriter {
    /// Create a rewriter with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(ProjectionPruningRule),
                Box::new(LimitInjectionRule),
                Box::new(SubqueryToJoinRule),
            ],
        }
    }

    /// Produce rewrite candidates for the request, highest confidence first.
    pub fn rewrite(
        &self,
        request: &OptimizationRequest,
        statistics: &QueryStatistics,
        model: &CostModel,
    ) -> Vec<OptimizedQuery> {
        let sql = request.query.trim();
        let normalized = sql.to_uppercase();
        let ctx = RewriteContext {
            sql,
            normalized: &normalized,
            statistics,
            request,
            model,
        };

        let mut candidates: Vec<OptimizedQuery> =
            self.rules.iter().filter_map(|rule| rule.apply(&ctx)).collect();
        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new()
    }
}

struct RewriteContext<'a> {
    sql: &'a str,
    normalized: &'a str,
    statistics: &'a QueryStatistics,
    request: &'a OptimizationRequest,
    model: &'a CostModel,
}

impl RewriteContext<'_> {
    fn enabled(&self, ty: OptimizationType) -> bool {
        self.request.enabled_types.contains(&ty)
    }

    fn level(&self) -> u8 {
        self.request.level.level()
    }

    /// Build a candidate, costing the rewritten text against the request's
    /// table statistics.
    fn candidate(
        &self,
        rewritten: String,
        explanation: impl Into<String>,
        ty: OptimizationType,
        confidence: f64,
    ) -> OptimizedQuery {
        let cost = self
            .model
            .estimate(&rewritten, &self.request.table_statistics);
        OptimizedQuery::new(rewritten, explanation, ty, cost, confidence)
    }
}

// ---------------------------------------------------------------------------
// Rewrite rule trait
// ---------------------------------------------------------------------------

trait RewriteRule {
    fn apply(&self, ctx: &RewriteContext<'_>) -> Option<OptimizedQuery>;
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

/// Replaces an unqualified `SELECT *` with a bounded column list taken from
/// the first table that reports columns, or a generic placeholder list.
struct ProjectionPruningRule;

impl RewriteRule for ProjectionPruningRule {
    fn apply(&self, ctx: &RewriteContext<'_>) -> Option<OptimizedQuery> {
        if !ctx.enabled(OptimizationType::ProjectionPruning) {
            return None;
        }

        let columns = projection_columns(ctx.request);
        let rewritten = replace_select_star(ctx.sql, &columns)?;
        Some(ctx.candidate(
            rewritten,
            "Replaced SELECT * with an explicit column list to reduce transferred data",
            OptimizationType::ProjectionPruning,
            0.9,
        ))
    }
}

/// Appends `LIMIT 1000` to an unbounded SELECT.
struct LimitInjectionRule;

impl RewriteRule for LimitInjectionRule {
    fn apply(&self, ctx: &RewriteContext<'_>) -> Option<OptimizedQuery> {
        if !ctx.enabled(OptimizationType::LimitInjection) {
            return None;
        }
        if !ctx.normalized.trim_start().starts_with("SELECT") || ctx.statistics.has_limit {
            return None;
        }

        let body = ctx.sql.trim_end().trim_end_matches(';').trim_end();
        let rewritten = format!("{} LIMIT {}", body, DEFAULT_INJECTED_LIMIT);
        Some(ctx.candidate(
            rewritten,
            format!(
                "Appended LIMIT {} to bound an otherwise unbounded result set",
                DEFAULT_INJECTED_LIMIT
            ),
            OptimizationType::LimitInjection,
            0.8,
        ))
    }
}

/// Converts a `WHERE col IN (SELECT ...)` pattern to an `INNER JOIN
/// (SELECT ...)` form. Fires only at ADVANCED level or above.
struct SubqueryToJoinRule;

impl RewriteRule for SubqueryToJoinRule {
    fn apply(&self, ctx: &RewriteContext<'_>) -> Option<OptimizedQuery> {
        if !ctx.enabled(OptimizationType::SubqueryOptimization) {
            return None;
        }
        if ctx.level() < OptimizationLevel::Advanced.level() || !ctx.statistics.has_subquery() {
            return None;
        }

        let rewritten = rewrite_in_subquery(ctx.sql)?;
        Some(
            ctx.candidate(
                rewritten,
                "Converted IN-subquery predicate to an INNER JOIN form",
                OptimizationType::SubqueryOptimization,
                0.7,
            )
            .with_warning(
                "Subquery-to-join conversion is a textual rewrite and requires manual review",
            ),
        )
    }
}

// ---------------------------------------------------------------------------
// Text manipulation helpers
// ---------------------------------------------------------------------------

/// Case-insensitive substring search returning a byte offset into `haystack`.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Replace the `*` of the first `SELECT *` with `columns`, preserving the
/// rest of the query byte for byte. Returns `None` when the query has no
/// unqualified star projection.
fn replace_select_star(sql: &str, columns: &str) -> Option<String> {
    let select = find_ci(sql, "SELECT")?;
    let bytes = sql.as_bytes();
    let mut idx = select + "SELECT".len();
    if idx >= bytes.len() || !bytes[idx].is_ascii_whitespace() {
        return None;
    }
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    if idx >= bytes.len() || bytes[idx] != b'*' {
        return None;
    }

    let mut out = String::with_capacity(sql.len() + columns.len());
    out.push_str(&sql[..idx]);
    out.push_str(columns);
    out.push_str(&sql[idx + 1..]);
    Some(out)
}

/// Column list for projection pruning: up to [`MAX_PROJECTION_COLUMNS`] names
/// from the first table that reports columns, or the fallback list.
fn projection_columns(request: &OptimizationRequest) -> String {
    request
        .table_statistics
        .iter()
        .find(|t| !t.columns.is_empty())
        .map(|t| {
            t.columns
                .iter()
                .take(MAX_PROJECTION_COLUMNS)
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| FALLBACK_PROJECTION.to_string())
}

/// Replace the first `WHERE <col> IN (SELECT` segment with
/// `INNER JOIN (SELECT`, leaving the rest of the text untouched.
fn rewrite_in_subquery(sql: &str) -> Option<String> {
    let where_pos = find_ci(sql, "WHERE")?;
    let after_where = &sql[where_pos + "WHERE".len()..];

    // find a standalone IN keyword, not a prefix of an identifier
    let mut search_from = 0;
    let in_rel = loop {
        let rel = find_ci(&after_where[search_from..], " IN")? + search_from;
        let next = after_where.as_bytes().get(rel + " IN".len());
        if next.map_or(true, |b| !b.is_ascii_alphanumeric() && *b != b'_') {
            break rel;
        }
        search_from = rel + 1;
    };

    // the token between WHERE and IN must be a plain column reference
    let column = after_where[..in_rel].trim();
    if column.is_empty() || !column.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return None;
    }

    let after_in = &after_where[in_rel + " IN".len()..];
    let paren = after_in.trim_start();
    if !paren.starts_with('(') {
        return None;
    }
    let select_in_paren = paren[1..].trim_start();
    if find_ci(select_in_paren, "SELECT") != Some(0) {
        return None;
    }

    let consumed = after_where.len() - paren.len() + 1;
    let tail = &after_where[consumed..];
    Some(format!("{}INNER JOIN ({}", &sql[..where_pos], tail.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnStatistics, TableStatistics};

    fn request(query: &str) -> OptimizationRequest {
        OptimizationRequest::new(query, "postgresql")
    }

    fn rewrite(request: &OptimizationRequest) -> Vec<OptimizedQuery> {
        let statistics = QueryStatistics::collect(&request.query);
        QueryRewriter::new().rewrite(request, &statistics, &CostModel::new())
    }

    #[test]
    fn test_projection_pruning_uses_table_columns() {
        let table = TableStatistics::new("orders", 1000)
            .with_column(ColumnStatistics::new("id"))
            .with_column(ColumnStatistics::new("customer_id"))
            .with_column(ColumnStatistics::new("total"));
        let request = request("SELECT * FROM orders").with_table_statistics(vec![table]);

        let candidates = rewrite(&request);
        let pruned = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::ProjectionPruning])
            .unwrap();
        assert_eq!(
            pruned.rewritten_query,
            "SELECT id, customer_id, total FROM orders"
        );
        assert_eq!(pruned.confidence, 0.9);
    }

    #[test]
    fn test_projection_pruning_caps_at_five_columns() {
        let mut table = TableStatistics::new("wide", 10);
        for name in ["a", "b", "c", "d", "e", "f", "g"] {
            table = table.with_column(ColumnStatistics::new(name));
        }
        let request = request("SELECT * FROM wide").with_table_statistics(vec![table]);

        let candidates = rewrite(&request);
        let pruned = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::ProjectionPruning])
            .unwrap();
        assert_eq!(pruned.rewritten_query, "SELECT a, b, c, d, e FROM wide");
    }

    #[test]
    fn test_projection_pruning_fallback_columns() {
        let candidates = rewrite(&request("SELECT * FROM t"));
        let pruned = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::ProjectionPruning])
            .unwrap();
        assert_eq!(pruned.rewritten_query, "SELECT id, name, created_at FROM t");
    }

    #[test]
    fn test_limit_injection() {
        let candidates = rewrite(&request("SELECT id FROM t;"));
        let limited = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::LimitInjection])
            .unwrap();
        assert_eq!(limited.rewritten_query, "SELECT id FROM t LIMIT 1000");
        assert_eq!(limited.confidence, 0.8);
    }

    #[test]
    fn test_limit_injection_skips_bounded_query() {
        let candidates = rewrite(&request("SELECT id FROM t LIMIT 10"));
        assert!(!candidates
            .iter()
            .any(|c| c.applied_optimizations == [OptimizationType::LimitInjection]));
    }

    #[test]
    fn test_subquery_rule_requires_advanced_level() {
        let query = "SELECT id FROM orders WHERE customer_id IN (SELECT id FROM customers)";

        let basic = request(query).with_level(OptimizationLevel::Basic);
        assert!(!rewrite(&basic)
            .iter()
            .any(|c| c.applied_optimizations == [OptimizationType::SubqueryOptimization]));

        let advanced = request(query).with_level(OptimizationLevel::Advanced);
        let candidates = rewrite(&advanced);
        let converted = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::SubqueryOptimization])
            .unwrap();
        assert_eq!(
            converted.rewritten_query,
            "SELECT id FROM orders INNER JOIN (SELECT id FROM customers)"
        );
        assert_eq!(converted.confidence, 0.7);
        assert!(!converted.warnings.is_empty());
    }

    #[test]
    fn test_disabled_type_suppresses_rule() {
        let request = request("SELECT * FROM t")
            .with_enabled_types([OptimizationType::LimitInjection].into_iter().collect());
        let candidates = rewrite(&request);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].applied_optimizations,
            [OptimizationType::LimitInjection]
        );
    }

    #[test]
    fn test_candidates_sorted_by_confidence() {
        let request = request(
            "SELECT * FROM orders WHERE customer_id IN (SELECT id FROM customers)",
        )
        .with_level(OptimizationLevel::Aggressive);
        let candidates = rewrite(&request);
        assert!(candidates.len() >= 2);
        for pair in candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_limit_candidate_is_cheaper_than_original() {
        let table = TableStatistics::new("orders", 500_000);
        let request = request("SELECT * FROM orders").with_table_statistics(vec![table.clone()]);
        let candidates = rewrite(&request);
        let limited = candidates
            .iter()
            .find(|c| c.applied_optimizations == [OptimizationType::LimitInjection])
            .unwrap();

        let original = CostModel::new().estimate("SELECT * FROM orders", &[table]);
        assert!(limited.cost_estimate.total_cost < original.total_cost);
    }
}
