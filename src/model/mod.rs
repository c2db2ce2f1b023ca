//! Data model for the sage optimization engine.
//!
//! This module holds the request/response types exchanged with callers and
//! the catalog statistics supplied by an external metadata provider. All of
//! it is serde-serializable so the engine can sit behind a JSON API.

mod request;
mod response;
mod statistics;

pub use request::{OptimizationLevel, OptimizationRequest, OptimizationType};
pub use response::{
    CostAnalysis, Difficulty, OptimizationResponse, OptimizationSuggestion, OptimizedQuery,
};
pub use statistics::{ColumnStatistics, IndexInformation, TableStatistics};
