//! Optimization response aggregate.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collector::QueryStatistics;
use crate::cost::CostEstimate;
use crate::model::OptimizationType;
use crate::plan::ExecutionPlanAnalysis;

/// One candidate rewrite of the original query.
///
/// Candidates are standalone: each applies its rule to the original text, so
/// callers can adopt any subset independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedQuery {
    /// The rewritten SQL text
    pub rewritten_query: String,
    /// Human-readable explanation of what changed and why
    pub explanation: String,
    /// Which optimizations produced this candidate
    pub applied_optimizations: Vec<OptimizationType>,
    /// Estimated cost of the rewritten query
    pub cost_estimate: CostEstimate,
    /// Confidence in [0, 1] that the rewrite is beneficial and equivalent
    pub confidence: f64,
    /// Indexes the rewrite relies on to pay off
    pub required_indexes: Vec<String>,
    /// Caveats the caller must review before adopting the rewrite
    pub warnings: Vec<String>,
}

impl OptimizedQuery {
    /// Create a candidate for a single applied optimization.
    pub fn new(
        rewritten_query: impl Into<String>,
        explanation: impl Into<String>,
        applied: OptimizationType,
        cost_estimate: CostEstimate,
        confidence: f64,
    ) -> Self {
        Self {
            rewritten_query: rewritten_query.into(),
            explanation: explanation.into(),
            applied_optimizations: vec![applied],
            cost_estimate,
            confidence,
            required_indexes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Attach a required index.
    pub fn with_required_index(mut self, index: impl Into<String>) -> Self {
        self.required_indexes.push(index.into());
        self
    }
}

/// How hard a suggestion is to implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Low => write!(f, "Low"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::High => write!(f, "High"),
        }
    }
}

/// A non-rewrite recommendation, such as creating an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    /// The optimization kind this suggestion belongs to
    pub suggestion_type: OptimizationType,
    /// What the suggestion is about
    pub description: String,
    /// Concrete implementation text (e.g. a `CREATE INDEX` statement)
    pub implementation: String,
    /// Expected impact in [0, 1]
    pub impact_score: f64,
    /// Implementation difficulty tier
    pub difficulty: Difficulty,
    /// Estimated implementation effort
    pub estimated_effort: Duration,
    /// What must be in place before implementing
    pub prerequisites: Vec<String>,
    /// Known risks of implementing
    pub risks: Vec<String>,
}

impl OptimizationSuggestion {
    /// Create a suggestion with empty prerequisites and risks.
    pub fn new(
        suggestion_type: OptimizationType,
        description: impl Into<String>,
        implementation: impl Into<String>,
        impact_score: f64,
        difficulty: Difficulty,
        estimated_effort: Duration,
    ) -> Self {
        Self {
            suggestion_type,
            description: description.into(),
            implementation: implementation.into(),
            impact_score,
            difficulty,
            estimated_effort,
            prerequisites: Vec::new(),
            risks: Vec::new(),
        }
    }

    /// Attach a prerequisite.
    pub fn with_prerequisite(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }

    /// Attach a risk.
    pub fn with_risk(mut self, risk: impl Into<String>) -> Self {
        self.risks.push(risk.into());
        self
    }
}

/// Original-versus-best cost comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    /// Estimated cost of the original query
    pub original_cost: CostEstimate,
    /// Estimated cost of the cheapest rewrite candidate, when one exists
    pub optimized_cost: Option<CostEstimate>,
    /// Relative improvement of the cheapest candidate over the original, in
    /// percent. Only populated when at least one candidate exists.
    pub improvement_percentage: Option<f64>,
}

impl CostAnalysis {
    /// Build the analysis from the original estimate and the candidate list.
    pub fn compare(original: CostEstimate, candidates: &[OptimizedQuery]) -> Self {
        let best = candidates
            .iter()
            .map(|c| &c.cost_estimate)
            .min_by(|a, b| {
                a.total_cost
                    .partial_cmp(&b.total_cost)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        let improvement = best.as_ref().map(|best| {
            if original.total_cost > 0.0 {
                (original.total_cost - best.total_cost) / original.total_cost * 100.0
            } else {
                0.0
            }
        });

        Self {
            original_cost: original,
            optimized_cost: best,
            improvement_percentage: improvement,
        }
    }
}

/// The top-level result of one `optimize` call.
///
/// Always returned, also on failure: `success=false` plus `error_message`
/// replace a thrown error. Warnings never affect `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    /// Correlation id for audit/reporting collaborators
    pub id: Uuid,
    /// The query as submitted
    pub original_query: String,
    /// Rewrite candidates, best confidence first
    pub optimized_queries: Vec<OptimizedQuery>,
    /// Non-rewrite recommendations
    pub suggestions: Vec<OptimizationSuggestion>,
    /// Simulated execution plan, when requested
    pub execution_plan: Option<ExecutionPlanAnalysis>,
    /// Original-versus-best cost comparison, when requested
    pub cost_analysis: Option<CostAnalysis>,
    /// Structural metrics of the original query text
    pub query_statistics: QueryStatistics,
    /// Whether the optimization ran to completion
    pub success: bool,
    /// Human-readable failure description, when `success` is false
    pub error_message: Option<String>,
    /// Non-fatal caveats (risky rewrites, exceeded time budget, ...)
    pub warnings: Vec<String>,
    /// Wall-clock time the engine spent on this call
    pub optimization_time: Duration,
    /// When the response was computed
    pub timestamp: DateTime<Utc>,
}

impl OptimizationResponse {
    /// Create an empty successful response frame for the given query. The
    /// orchestrator fills in results before handing it out.
    pub fn empty(original_query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_query: original_query.into(),
            optimized_queries: Vec::new(),
            suggestions: Vec::new(),
            execution_plan: None,
            cost_analysis: None,
            query_statistics: QueryStatistics::default(),
            success: true,
            error_message: None,
            warnings: Vec::new(),
            optimization_time: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed response carrying the error message.
    pub fn failed(original_query: impl Into<String>, message: impl Into<String>) -> Self {
        let mut response = Self::empty(original_query);
        response.success = false;
        response.error_message = Some(message.into());
        response
    }

    /// The highest-confidence candidate, when any exists.
    pub fn best_candidate(&self) -> Option<&OptimizedQuery> {
        self.optimized_queries.first()
    }

    /// Human-readable report over the whole response.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Optimization report for: {}", self.original_query));

        if !self.success {
            lines.push(format!(
                "  status: FAILED: {}",
                self.error_message.as_deref().unwrap_or("unknown error")
            ));
            return lines.join("\n");
        }

        lines.push(format!(
            "  status: ok ({} ms, complexity {})",
            self.optimization_time.as_millis(),
            self.query_statistics.complexity_score
        ));

        if self.optimized_queries.is_empty() {
            lines.push("  candidates: none".to_string());
        } else {
            lines.push(format!("  candidates ({}):", self.optimized_queries.len()));
            for (i, candidate) in self.optimized_queries.iter().enumerate() {
                lines.push(format!(
                    "    {}. [confidence {:.2}] {}",
                    i + 1,
                    candidate.confidence,
                    candidate.rewritten_query
                ));
            }
        }

        if !self.suggestions.is_empty() {
            lines.push(format!("  suggestions ({}):", self.suggestions.len()));
            for suggestion in &self.suggestions {
                lines.push(format!(
                    "    - [impact {:.2}] {}",
                    suggestion.impact_score, suggestion.implementation
                ));
            }
        }

        if let Some(ref plan) = self.execution_plan {
            if !plan.bottlenecks.is_empty() {
                lines.push(format!("  bottlenecks ({}):", plan.bottlenecks.len()));
                for bottleneck in &plan.bottlenecks {
                    lines.push(format!("    - {}", bottleneck));
                }
            }
        }

        if let Some(ref analysis) = self.cost_analysis {
            if let Some(pct) = analysis.improvement_percentage {
                lines.push(format!("  estimated improvement: {:.1}%", pct));
            }
        }

        for warning in &self.warnings {
            lines.push(format!("  warning: {}", warning));
        }

        lines.join("\n")
    }
}
