//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::ingest::RunSummary;
use crate::query::{BuiltQuery, ItemSummary};
use crate::storage::{
    FailedRequestRecord, ItemRecord, LookupKind, MasterListEntry, RunRecord, RunStatus,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
/// A single writer is assumed; readers may open the same database
/// concurrently.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records the final status and counters of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    // ===== Master List =====

    /// Replaces the cached master list
    fn save_master_list(&mut self, entries: &[MasterListEntry]) -> StorageResult<()>;

    /// Loads the cached master list in its original order
    fn load_master_list(&self) -> StorageResult<Vec<MasterListEntry>>;

    /// Finds the cached master list entry for an item
    fn get_master_entry(&self, id: i64) -> StorageResult<Option<MasterListEntry>>;

    // ===== Items =====

    /// Inserts or updates an item together with all of its relations
    ///
    /// The whole merge happens in one transaction. Merging the same record
    /// twice leaves the database unchanged, and any failure or
    /// over-threshold marker for the item is cleared.
    fn merge_item(&mut self, item: &ItemRecord) -> StorageResult<()>;

    /// Gets a merged item by ID
    fn get_item(&self, id: i64) -> StorageResult<Option<ItemRecord>>;

    /// Gets total item count
    fn count_items(&self) -> StorageResult<u64>;

    /// Counts the rows of one lookup table
    fn count_lookup(&self, kind: LookupKind) -> StorageResult<u64>;

    // ===== Outcome Logs =====

    /// Marks an item as ineligible for the catalog
    fn record_ineligible(&mut self, id: i64) -> StorageResult<()>;

    /// Gets all ineligible item IDs
    fn list_ineligible(&self) -> StorageResult<Vec<i64>>;

    /// Records that an item's minimum owner count exceeds the ceiling
    fn record_over_threshold(&mut self, id: i64, min_owners: i64) -> StorageResult<()>;

    /// Gets all over-threshold items with their minimum owner count
    fn list_over_threshold(&self) -> StorageResult<Vec<(i64, i64)>>;

    /// Records a failure, replacing any earlier failure for the same item
    fn record_failed_request(&mut self, record: &FailedRequestRecord) -> StorageResult<()>;

    /// Clears the failure for an item
    fn delete_failed_request(&mut self, id: i64) -> StorageResult<()>;

    /// Gets all unresolved failures ordered by item ID
    fn list_failed_requests(&self) -> StorageResult<Vec<FailedRequestRecord>>;

    /// IDs that regular runs skip: ineligible items and hard failures
    fn exclusion_set(&self) -> StorageResult<HashSet<i64>>;

    // ===== Maintenance =====

    /// Deletes relation rows that point at missing items or lookups
    ///
    /// # Returns
    ///
    /// The number of rows removed
    fn prune_orphan_relations(&mut self) -> StorageResult<u64>;

    // ===== Queries =====

    /// Executes a built read-side query
    fn query_items(&self, query: &BuiltQuery) -> StorageResult<Vec<ItemSummary>>;
}
