//! Optimization request and policy types.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SageError};
use crate::model::{IndexInformation, TableStatistics};

/// Default time budget for a single optimization call.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(30);

/// How aggressively the engine may rewrite a query.
///
/// The ordinal strictly gates which rewrite rules are allowed to fire: a rule
/// declared for level N never fires below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum OptimizationLevel {
    /// Only ever-safe rewrites (level 1)
    Basic,
    /// Safe rewrites plus bounded result shaping (level 2)
    #[default]
    Intermediate,
    /// The recommended everyday setting (level 3)
    Standard,
    /// Structural rewrites such as subquery flattening (level 4)
    Advanced,
    /// Everything the engine knows, including risky rewrites (level 5)
    Aggressive,
}

impl OptimizationLevel {
    /// Ordinal used for gating comparisons, 1 through 5.
    pub fn level(&self) -> u8 {
        match self {
            Self::Basic => 1,
            Self::Intermediate => 2,
            Self::Standard => 3,
            Self::Advanced => 4,
            Self::Aggressive => 5,
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Standard => "standard",
            Self::Advanced => "advanced",
            Self::Aggressive => "aggressive",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OptimizationLevel {
    type Err = SageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "1" => Ok(Self::Basic),
            "intermediate" | "2" => Ok(Self::Intermediate),
            "standard" | "3" => Ok(Self::Standard),
            "advanced" | "4" => Ok(Self::Advanced),
            "aggressive" | "5" => Ok(Self::Aggressive),
            other => Err(SageError::validation(format!(
                "unknown optimization level '{}'",
                other
            ))),
        }
    }
}

/// The kinds of optimization the engine can produce.
///
/// The request carries an enabled set; the orchestrator only invokes the
/// index advisor when [`OptimizationType::IndexOptimization`] is enabled, and
/// every rewrite candidate is tagged with the types that produced it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OptimizationType {
    /// Structural index suggestions
    IndexOptimization,
    /// Replacing `SELECT *` with a bounded column list
    ProjectionPruning,
    /// Appending a row cap to unbounded SELECTs
    LimitInjection,
    /// Textual subquery-to-join conversion
    SubqueryOptimization,
}

impl OptimizationType {
    /// Every known optimization type.
    pub const ALL: [OptimizationType; 4] = [
        Self::IndexOptimization,
        Self::ProjectionPruning,
        Self::LimitInjection,
        Self::SubqueryOptimization,
    ];

    /// The full enabled set (the request default).
    pub fn all() -> BTreeSet<OptimizationType> {
        Self::ALL.iter().copied().collect()
    }
}

impl fmt::Display for OptimizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IndexOptimization => "index_optimization",
            Self::ProjectionPruning => "projection_pruning",
            Self::LimitInjection => "limit_injection",
            Self::SubqueryOptimization => "subquery_optimization",
        };
        write!(f, "{}", name)
    }
}

/// Immutable input to a single `optimize` call.
///
/// Built once by the caller and never mutated afterwards. Statistics and
/// index descriptions come from an external catalog; the engine treats them
/// as read-only ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Original SQL text
    pub query: String,
    /// Database type identifier (e.g. "postgresql", "mysql")
    pub database_type: String,
    /// Schema the query runs against, when known
    pub schema_name: Option<String>,
    /// Statistics for the referenced tables
    pub table_statistics: Vec<TableStatistics>,
    /// Existing indexes
    pub indexes: Vec<IndexInformation>,
    /// Rewrite aggressiveness
    pub level: OptimizationLevel,
    /// Which optimization kinds the caller wants
    pub enabled_types: BTreeSet<OptimizationType>,
    /// Advisory time budget for the whole call
    pub max_optimization_time: Duration,
    /// Run the execution plan analyzer
    pub analyze_execution_plan: bool,
    /// Generate rewritten query candidates
    pub generate_alternatives: bool,
    /// Compute the cost analysis
    pub estimate_costs: bool,
}

impl OptimizationRequest {
    /// Create a request with default policy: intermediate level, all
    /// optimization types enabled, all analyses on, 30 second budget.
    pub fn new(query: impl Into<String>, database_type: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            database_type: database_type.into(),
            schema_name: None,
            table_statistics: Vec::new(),
            indexes: Vec::new(),
            level: OptimizationLevel::default(),
            enabled_types: OptimizationType::all(),
            max_optimization_time: DEFAULT_TIME_BUDGET,
            analyze_execution_plan: true,
            generate_alternatives: true,
            estimate_costs: true,
        }
    }

    /// Set the schema name.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema_name = Some(schema.into());
        self
    }

    /// Attach statistics for one table.
    pub fn with_table(mut self, stats: TableStatistics) -> Self {
        self.table_statistics.push(stats);
        self
    }

    /// Replace all table statistics.
    pub fn with_table_statistics(mut self, stats: Vec<TableStatistics>) -> Self {
        self.table_statistics = stats;
        self
    }

    /// Attach one existing index description.
    pub fn with_index(mut self, index: IndexInformation) -> Self {
        self.indexes.push(index);
        self
    }

    /// Replace all index descriptions.
    pub fn with_indexes(mut self, indexes: Vec<IndexInformation>) -> Self {
        self.indexes = indexes;
        self
    }

    /// Set the optimization level.
    pub fn with_level(mut self, level: OptimizationLevel) -> Self {
        self.level = level;
        self
    }

    /// Replace the enabled optimization types.
    pub fn with_enabled_types(mut self, types: BTreeSet<OptimizationType>) -> Self {
        self.enabled_types = types;
        self
    }

    /// Set the advisory time budget.
    pub fn with_max_optimization_time(mut self, budget: Duration) -> Self {
        self.max_optimization_time = budget;
        self
    }

    /// Toggle execution plan analysis.
    pub fn with_analyze_execution_plan(mut self, on: bool) -> Self {
        self.analyze_execution_plan = on;
        self
    }

    /// Toggle rewrite candidate generation.
    pub fn with_generate_alternatives(mut self, on: bool) -> Self {
        self.generate_alternatives = on;
        self
    }

    /// Toggle cost analysis.
    pub fn with_estimate_costs(mut self, on: bool) -> Self {
        self.estimate_costs = on;
        self
    }

    /// Validate the request before any sub-component runs.
    ///
    /// Fails fast so callers get a `validation error:` message distinct from
    /// internal failures.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(SageError::validation("query must not be empty"));
        }
        if self.database_type.trim().is_empty() {
            return Err(SageError::validation("database type must not be blank"));
        }
        if self.max_optimization_time.is_zero() {
            return Err(SageError::validation(
                "optimization time budget must be positive",
            ));
        }
        Ok(())
    }

    /// Stable cache fingerprint over the query text and the policy identity
    /// of the request.
    ///
    /// Statistics are deliberately excluded: they are inputs rather than
    /// policy, and cache staleness is bounded by the TTL instead.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.query.hash(&mut hasher);
        self.database_type.hash(&mut hasher);
        self.schema_name.hash(&mut hasher);
        self.level.hash(&mut hasher);
        // BTreeSet iterates in order, so the hash is independent of
        // insertion order.
        self.enabled_types.hash(&mut hasher);
        self.max_optimization_time.hash(&mut hasher);
        self.analyze_execution_plan.hash(&mut hasher);
        self.generate_alternatives.hash(&mut hasher);
        self.estimate_costs.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordinals() {
        assert_eq!(OptimizationLevel::Basic.level(), 1);
        assert_eq!(OptimizationLevel::Intermediate.level(), 2);
        assert_eq!(OptimizationLevel::Standard.level(), 3);
        assert_eq!(OptimizationLevel::Advanced.level(), 4);
        assert_eq!(OptimizationLevel::Aggressive.level(), 5);
    }

    #[test]
    fn test_level_ordering_follows_ordinal() {
        assert!(OptimizationLevel::Basic < OptimizationLevel::Intermediate);
        assert!(OptimizationLevel::Advanced < OptimizationLevel::Aggressive);
        assert!(OptimizationLevel::Aggressive >= OptimizationLevel::Advanced);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(
            "advanced".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Advanced
        );
        assert_eq!(
            "3".parse::<OptimizationLevel>().unwrap(),
            OptimizationLevel::Standard
        );
        assert!("turbo".parse::<OptimizationLevel>().is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request = OptimizationRequest::new("SELECT 1", "postgresql");
        assert_eq!(request.level, OptimizationLevel::Intermediate);
        assert_eq!(request.enabled_types.len(), OptimizationType::ALL.len());
        assert!(request.analyze_execution_plan);
        assert!(request.generate_alternatives);
        assert!(request.estimate_costs);
        assert_eq!(request.max_optimization_time, DEFAULT_TIME_BUDGET);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_query() {
        let request = OptimizationRequest::new("   ", "postgresql");
        let err = request.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_validation_rejects_blank_database_type() {
        let request = OptimizationRequest::new("SELECT 1", "  ");
        let err = request.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("database type"));
    }

    #[test]
    fn test_validation_rejects_zero_budget() {
        let request = OptimizationRequest::new("SELECT 1", "postgresql")
            .with_max_optimization_time(Duration::ZERO);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = OptimizationRequest::new("SELECT * FROM t", "postgresql");
        let b = OptimizationRequest::new("SELECT * FROM t", "postgresql");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_covers_policy_not_just_query() {
        let base = OptimizationRequest::new("SELECT * FROM t", "postgresql");
        let other_level = base.clone().with_level(OptimizationLevel::Aggressive);
        let other_types = base
            .clone()
            .with_enabled_types([OptimizationType::IndexOptimization].into_iter().collect());
        let other_flags = base.clone().with_estimate_costs(false);

        assert_ne!(base.fingerprint(), other_level.fingerprint());
        assert_ne!(base.fingerprint(), other_types.fingerprint());
        assert_ne!(base.fingerprint(), other_flags.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_statistics() {
        let base = OptimizationRequest::new("SELECT * FROM t", "postgresql");
        let with_stats = base.clone().with_table(TableStatistics::new("t", 100));
        assert_eq!(base.fingerprint(), with_stats.fingerprint());
    }
}
