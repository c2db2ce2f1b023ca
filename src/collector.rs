//! Structural statistics over raw SQL text.
//!
//! This is pattern-based scanning, not parsing. Keywords are counted on the
//! uppercased query with word-boundary checks, which is precise enough for
//! the heuristics downstream and keeps the collector dependency-free.

use serde::{Deserialize, Serialize};

/// Lightweight structural metrics for one query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatistics {
    /// Length of the raw query text in bytes
    pub query_length: usize,
    /// Number of `SELECT` keywords (more than one implies subqueries)
    pub select_count: u32,
    /// Number of `JOIN` keywords
    pub join_count: u32,
    /// Number of `WHERE` keywords
    pub where_count: u32,
    /// Number of `GROUP BY` clauses
    pub group_by_count: u32,
    /// Number of `ORDER BY` clauses
    pub order_by_count: u32,
    /// Whether the query has a `HAVING` clause
    pub has_having: bool,
    /// Whether the query has a `UNION` clause
    pub has_union: bool,
    /// Whether the query has a `LIMIT` clause
    pub has_limit: bool,
    /// The numeric argument of the `LIMIT` clause, when present and parseable
    pub limit_value: Option<u64>,
    /// Weighted structural complexity, see [`QueryStatistics::collect`]
    pub complexity_score: u32,
}

impl QueryStatistics {
    /// Collect statistics from a query string.
    ///
    /// Complexity is a weighted sum of structural features: JOIN and UNION
    /// weigh 2, GROUP BY / ORDER BY / HAVING weigh 1, and every SELECT beyond
    /// the first (a subquery) weighs 3. Empty or unrecognizable input yields
    /// an all-zero result, never an error.
    pub fn collect(query: &str) -> Self {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        let upper = trimmed.to_uppercase();

        let select_count = count_keyword(&upper, "SELECT");
        let join_count = count_keyword(&upper, "JOIN");
        let where_count = count_keyword(&upper, "WHERE");
        let group_by_count = count_clause(&upper, "GROUP", "BY");
        let order_by_count = count_clause(&upper, "ORDER", "BY");
        let has_having = count_keyword(&upper, "HAVING") > 0;
        let has_union = count_keyword(&upper, "UNION") > 0;
        let has_limit = count_keyword(&upper, "LIMIT") > 0;
        let limit_value = if has_limit { parse_limit(&upper) } else { None };

        let mut complexity = 0u32;
        if join_count > 0 {
            complexity += 2;
        }
        if group_by_count > 0 {
            complexity += 1;
        }
        if order_by_count > 0 {
            complexity += 1;
        }
        if has_having {
            complexity += 1;
        }
        if has_union {
            complexity += 2;
        }
        if select_count > 1 {
            complexity += 3 * (select_count - 1);
        }

        Self {
            query_length: trimmed.len(),
            select_count,
            join_count,
            where_count,
            group_by_count,
            order_by_count,
            has_having,
            has_union,
            has_limit,
            limit_value,
            complexity_score: complexity,
        }
    }

    /// Whether the query contains at least one subquery.
    pub fn has_subquery(&self) -> bool {
        self.select_count > 1
    }
}

// ---------------------------------------------------------------------------
// Keyword scanning helpers
// ---------------------------------------------------------------------------

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Count whole-word occurrences of `keyword` in uppercased text. Boundary
/// checks keep e.g. `SELECTED` from counting as `SELECT`.
fn count_keyword(upper: &str, keyword: &str) -> u32 {
    let bytes = upper.as_bytes();
    let mut count = 0u32;
    let mut from = 0;

    while let Some(pos) = upper[from..].find(keyword) {
        let start = from + pos;
        let end = start + keyword.len();
        let bounded_left = start == 0 || !is_word_byte(bytes[start - 1]);
        let bounded_right = end == bytes.len() || !is_word_byte(bytes[end]);
        if bounded_left && bounded_right {
            count += 1;
        }
        from = end;
    }

    count
}

/// Count two-word clauses such as `GROUP BY`, tolerating arbitrary
/// whitespace between the words.
fn count_clause(upper: &str, first: &str, second: &str) -> u32 {
    let bytes = upper.as_bytes();
    let mut count = 0u32;
    let mut from = 0;

    while let Some(pos) = upper[from..].find(first) {
        let start = from + pos;
        let end = start + first.len();
        let bounded_left = start == 0 || !is_word_byte(bytes[start - 1]);
        let bounded_right = end < bytes.len() && !is_word_byte(bytes[end]);
        if bounded_left && bounded_right {
            let rest = upper[end..].trim_start();
            if let Some(tail) = rest.strip_prefix(second) {
                if tail.is_empty() || !is_word_byte(tail.as_bytes()[0]) {
                    count += 1;
                }
            }
        }
        from = end;
    }

    count
}

/// Parse the integer argument of the first `LIMIT` clause, if any.
fn parse_limit(upper: &str) -> Option<u64> {
    let pos = upper.find("LIMIT")?;
    let rest = upper[pos + "LIMIT".len()..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_zero_valued() {
        assert_eq!(QueryStatistics::collect(""), QueryStatistics::default());
        assert_eq!(QueryStatistics::collect("   "), QueryStatistics::default());
    }

    #[test]
    fn test_simple_select() {
        let stats = QueryStatistics::collect("SELECT id FROM users");
        assert_eq!(stats.select_count, 1);
        assert_eq!(stats.join_count, 0);
        assert_eq!(stats.complexity_score, 0);
        assert!(!stats.has_limit);
    }

    #[test]
    fn test_complexity_weights() {
        let stats = QueryStatistics::collect(
            "SELECT a, COUNT(*) FROM t1 JOIN t2 ON t1.id = t2.t1_id \
             WHERE a > 1 GROUP BY a HAVING COUNT(*) > 2 ORDER BY a",
        );
        // join 2 + group by 1 + order by 1 + having 1
        assert_eq!(stats.complexity_score, 5);
        assert_eq!(stats.where_count, 1);
    }

    #[test]
    fn test_subqueries_add_three_each() {
        let stats = QueryStatistics::collect(
            "SELECT * FROM orders WHERE customer_id IN (SELECT id FROM customers)",
        );
        assert_eq!(stats.select_count, 2);
        assert!(stats.has_subquery());
        assert_eq!(stats.complexity_score, 3);
    }

    #[test]
    fn test_union_counts_two() {
        let stats = QueryStatistics::collect("SELECT a FROM t UNION SELECT a FROM u");
        // union 2 + one extra select 3
        assert_eq!(stats.complexity_score, 5);
        assert!(stats.has_union);
    }

    #[test]
    fn test_limit_value_parsed() {
        let stats = QueryStatistics::collect("SELECT * FROM t LIMIT 250");
        assert!(stats.has_limit);
        assert_eq!(stats.limit_value, Some(250));

        let stats = QueryStatistics::collect("select * from t limit 10;");
        assert_eq!(stats.limit_value, Some(10));
    }

    #[test]
    fn test_keyword_boundaries() {
        // column named "selected" must not count as SELECT
        let stats = QueryStatistics::collect("SELECT selected FROM t");
        assert_eq!(stats.select_count, 1);

        let stats = QueryStatistics::collect("SELECT joined_at FROM t");
        assert_eq!(stats.join_count, 0);
    }

    #[test]
    fn test_case_insensitive() {
        let stats = QueryStatistics::collect("select * from a join b on a.id = b.id");
        assert_eq!(stats.join_count, 1);
        assert_eq!(stats.complexity_score, 2);
    }
}
