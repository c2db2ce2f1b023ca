//! Index suggestions derived from filter and join predicates.
//!
//! Candidate columns come from two places: the token immediately following a
//! `WHERE` keyword, and the right-hand side of equality predicates inside
//! `ON` clauses. Join-derived gaps score higher than filter-derived ones
//! because an unindexed join touches every probe row. Columns already covered
//! by a supplied index are skipped.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{
    Difficulty, IndexInformation, OptimizationSuggestion, OptimizationType, TableStatistics,
};

/// Impact score for columns referenced in WHERE filters.
const WHERE_IMPACT: f64 = 0.8;

/// Impact score for columns referenced in JOIN conditions.
const JOIN_IMPACT: f64 = 0.9;

/// Heuristic default effort for creating one index.
const SUGGESTION_EFFORT: Duration = Duration::from_secs(5 * 60);

/// Proposes `CREATE INDEX` statements for uncovered predicate columns.
pub struct IndexAdvisor;

impl IndexAdvisor {
    pub fn new() -> Self {
        Self
    }

    /// Suggest indexes for every extracted predicate column that no existing
    /// index covers. Output is ordered by descending impact, then column
    /// name.
    pub fn suggest_indexes(
        &self,
        query: &str,
        tables: &[TableStatistics],
        existing: &[IndexInformation],
    ) -> Vec<OptimizationSuggestion> {
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        for candidate in where_columns(query).into_iter().chain(on_columns(query)) {
            let key = candidate.column.to_lowercase();
            match candidates.get(&key) {
                Some(kept) if kept.impact >= candidate.impact => {}
                _ => {
                    candidates.insert(key, candidate);
                }
            }
        }

        let mut suggestions: Vec<OptimizationSuggestion> = candidates
            .into_values()
            .filter(|c| !existing.iter().any(|idx| idx.covers_column(&c.column)))
            .map(|c| c.into_suggestion(query, tables))
            .collect();

        suggestions.sort_by(|a, b| {
            b.impact_score
                .partial_cmp(&a.impact_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.implementation.cmp(&b.implementation))
        });
        suggestions
    }
}

impl Default for IndexAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Candidate extraction
// ---------------------------------------------------------------------------

struct Candidate {
    column: String,
    qualifier: Option<String>,
    impact: f64,
    context: &'static str,
}

impl Candidate {
    fn into_suggestion(
        self,
        query: &str,
        tables: &[TableStatistics],
    ) -> OptimizationSuggestion {
        let table = resolve_table(&self.column, self.qualifier.as_deref(), query, tables);
        let index_name = format!("idx_{}_{}", table, self.column);
        let implementation = format!("CREATE INDEX {} ON {}({})", index_name, table, self.column);

        OptimizationSuggestion::new(
            OptimizationType::IndexOptimization,
            format!(
                "Column {} is used in a {} predicate but is not covered by any index",
                self.column, self.context
            ),
            implementation,
            self.impact,
            Difficulty::Low,
            SUGGESTION_EFFORT,
        )
        .with_risk(format!("Extra index increases write cost on {}", table))
    }
}

/// Pick the table the index should be created on: a table whose statistics
/// list the column, then the column's qualifier, then the first FROM table,
/// then the first supplied table.
fn resolve_table(
    column: &str,
    qualifier: Option<&str>,
    query: &str,
    tables: &[TableStatistics],
) -> String {
    if let Some(table) = tables.iter().find(|t| t.column(column).is_some()) {
        return table.table_name.clone();
    }
    if let Some(qualifier) = qualifier {
        return qualifier.to_string();
    }
    if let Some(pos) = find_keyword(query, "FROM", 0) {
        if let Some(token) = leading_identifier(&query[pos + "FROM".len()..]) {
            return token.to_string();
        }
    }
    tables
        .first()
        .map(|t| t.table_name.clone())
        .unwrap_or_else(|| "target_table".to_string())
}

/// Columns immediately following each `WHERE` keyword.
fn where_columns(query: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut from = 0;

    while let Some(pos) = find_keyword(query, "WHERE", from) {
        from = pos + "WHERE".len();
        let rest = &query[from..];
        if let Some(token) = leading_identifier(rest) {
            // skip function calls such as UPPER(col)
            let after = rest.trim_start()[token.len()..].trim_start();
            if after.starts_with('(') {
                continue;
            }
            let (qualifier, column) = split_qualified(token);
            out.push(Candidate {
                column: column.to_string(),
                qualifier: qualifier.map(str::to_string),
                impact: WHERE_IMPACT,
                context: "filter",
            });
        }
    }

    out
}

/// Right-hand columns of equality predicates inside each `ON` clause.
fn on_columns(query: &str) -> Vec<Candidate> {
    const TERMINATORS: [&str; 12] = [
        "WHERE", "GROUP", "ORDER", "LIMIT", "HAVING", "UNION", "JOIN", "INNER", "LEFT", "RIGHT",
        "FULL", "ON",
    ];

    let mut out = Vec::new();
    let mut from = 0;

    while let Some(pos) = find_keyword(query, "ON", from) {
        let clause_start = pos + "ON".len();
        from = clause_start;

        let clause_end = TERMINATORS
            .iter()
            .filter_map(|kw| find_keyword(query, kw, clause_start))
            .min()
            .unwrap_or(query.len());
        let clause = &query[clause_start..clause_end];

        for conjunct in split_keyword(clause, "AND") {
            let mut sides = conjunct.splitn(2, '=');
            let (Some(_left), Some(right)) = (sides.next(), sides.next()) else {
                continue;
            };
            let Some(token) = leading_identifier(right) else {
                continue;
            };
            let (qualifier, column) = split_qualified(token);
            out.push(Candidate {
                column: column.to_string(),
                qualifier: qualifier.map(str::to_string),
                impact: JOIN_IMPACT,
                context: "join",
            });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Token scanning helpers
// ---------------------------------------------------------------------------

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Find a word-bounded keyword case-insensitively, starting at `from`.
/// Returns the byte offset of the keyword.
fn find_keyword(text: &str, keyword: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let needle = keyword.as_bytes();
    if from + needle.len() > bytes.len() {
        return None;
    }

    (from..=bytes.len() - needle.len()).find(|&i| {
        bytes[i..i + needle.len()].eq_ignore_ascii_case(needle)
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && (i + needle.len() == bytes.len() || !is_word_byte(bytes[i + needle.len()]))
    })
}

/// The identifier token at the start of `text` after leading whitespace.
/// Identifiers may be dot-qualified; anything else yields `None`.
fn leading_identifier(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    let first = trimmed.chars().next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '.')
        .unwrap_or(trimmed.len());
    let token = trimmed[..end].trim_end_matches('.');
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Split `table.column` into its qualifier and column parts.
fn split_qualified(token: &str) -> (Option<&str>, &str) {
    match token.rsplit_once('.') {
        Some((qualifier, column)) => (Some(qualifier), column),
        None => (None, token),
    }
}

/// Split on a word-bounded keyword, case-insensitively.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut from = 0;

    while let Some(pos) = find_keyword(text, keyword, from) {
        parts.push(&text[start..pos]);
        start = pos + keyword.len();
        from = start;
    }
    parts.push(&text[start..]);
    parts
}
