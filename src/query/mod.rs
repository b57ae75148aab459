//! Read-side query module
//!
//! This module contains:
//! - The typed item query and its query-string parser
//! - Allow-listed ordering columns and two-column expressions
//! - Execution against any storage backend

mod builder;
mod order;

pub use builder::{BuiltQuery, Comparison, ItemQuery, ItemSummary, MAX_LIMIT};
pub use order::{parse_order_list, ArithOp, Direction, OrderTerm, SortColumn, SortExpr};

use crate::storage::Storage;
use thiserror::Error;

/// Errors raised while parsing or building a query
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unknown query parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown sort direction: {0}")]
    UnknownDirection(String),

    #[error("Unknown comparison operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Limit must be between 1 and 20, got {0}")]
    LimitOutOfRange(u32),
}

/// Parses `query_string`, builds it, and runs it against `storage`
pub fn run_query<S: Storage + ?Sized>(
    storage: &S,
    query_string: &str,
) -> crate::Result<Vec<ItemSummary>> {
    let query = ItemQuery::from_query_string(query_string)?;
    let built = query.build()?;
    tracing::debug!("Item query: {} ({} params)", built.sql, built.params.len());
    Ok(storage.query_items(&built)?)
}
