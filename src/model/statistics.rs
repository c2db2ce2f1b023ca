//! Catalog statistics supplied by an external metadata provider.
//!
//! These are read-only inputs to the engine: the caller gathers them from
//! whatever catalog it has access to and attaches them to the request. The
//! engine never measures anything itself.

use serde::{Deserialize, Serialize};

/// Statistics for a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Column name
    pub name: String,
    /// Number of distinct values (NDV)
    pub distinct_count: u64,
    /// Fraction of rows that are NULL, in [0, 1]
    pub null_ratio: f64,
    /// Minimum value (as string for simplicity)
    pub min_value: Option<String>,
    /// Maximum value (as string for simplicity)
    pub max_value: Option<String>,
    /// Whether an index already covers this column
    pub indexed: bool,
}

impl ColumnStatistics {
    /// Create new column statistics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            distinct_count: 0,
            null_ratio: 0.0,
            min_value: None,
            max_value: None,
            indexed: false,
        }
    }

    /// Set the distinct count.
    pub fn with_distinct_count(mut self, count: u64) -> Self {
        self.distinct_count = count;
        self
    }

    /// Set the null ratio.
    pub fn with_null_ratio(mut self, ratio: f64) -> Self {
        self.null_ratio = ratio;
        self
    }

    /// Set min and max values.
    pub fn with_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    /// Mark the column as indexed.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// Statistics for a table.
///
/// Columns are kept in catalog order: projection pruning derives its bounded
/// column list from the leading columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    /// Table name
    pub table_name: String,
    /// Number of rows in the table
    pub row_count: u64,
    /// Total data size in bytes
    pub data_size_bytes: u64,
    /// Total index size in bytes (zero when the table has no indexes)
    pub index_size_bytes: u64,
    /// Per-column statistics, in catalog order
    pub columns: Vec<ColumnStatistics>,
}

impl TableStatistics {
    /// Create new table statistics.
    pub fn new(table_name: impl Into<String>, row_count: u64) -> Self {
        Self {
            table_name: table_name.into(),
            row_count,
            data_size_bytes: 0,
            index_size_bytes: 0,
            columns: Vec::new(),
        }
    }

    /// Set the data size in bytes.
    pub fn with_data_size(mut self, bytes: u64) -> Self {
        self.data_size_bytes = bytes;
        self
    }

    /// Set the index size in bytes.
    pub fn with_index_size(mut self, bytes: u64) -> Self {
        self.index_size_bytes = bytes;
        self
    }

    /// Append column statistics.
    pub fn with_column(mut self, column: ColumnStatistics) -> Self {
        self.columns.push(column);
        self
    }

    /// Get column statistics by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Whether the table reports any index storage at all.
    pub fn has_indexes(&self) -> bool {
        self.index_size_bytes > 0
    }
}

/// Description of an existing index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInformation {
    /// Index name
    pub index_name: String,
    /// Owning table
    pub table_name: String,
    /// Indexed columns, in key order
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Whether this is the primary key index
    pub primary: bool,
    /// Fraction of rows the index is expected to filter out (supplied, not
    /// computed)
    pub selectivity: f64,
    /// How often the index has been used, per the catalog's counters
    pub usage_count: u64,
}

impl IndexInformation {
    /// Create a new index description.
    pub fn new(
        index_name: impl Into<String>,
        table_name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            columns,
            unique: false,
            primary: false,
            selectivity: 0.0,
            usage_count: 0,
        }
    }

    /// Mark the index as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark the index as the primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self
    }

    /// Set the supplied selectivity.
    pub fn with_selectivity(mut self, selectivity: f64) -> Self {
        self.selectivity = selectivity;
        self
    }

    /// Set the usage counter.
    pub fn with_usage_count(mut self, count: u64) -> Self {
        self.usage_count = count;
        self
    }

    /// Whether this index covers the given column (case-insensitive).
    pub fn covers_column(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
    }
}
