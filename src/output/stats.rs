//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::fetch::ErrorKind;
use crate::state::CheckpointLog;
use crate::storage::{FailedRequestRecord, LookupKind, Provider, RunRecord, Storage};
use crate::HarvestError;
use std::collections::BTreeMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Merged items
    pub items: u64,

    /// Rows in the tag, genre and category lookup tables
    pub tags: u64,
    pub genres: u64,
    pub categories: u64,

    /// Items permanently excluded for their type
    pub ineligible: u64,

    /// Items above the ownership ceiling at their last check
    pub over_threshold: u64,

    /// Unresolved failures, ordered by item id
    pub failed_requests: Vec<FailedRequestRecord>,

    /// Checkpoint as currently saved
    pub checkpoint: CheckpointLog,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl HarvestStatistics {
    pub fn failures_by_provider(&self) -> BTreeMap<Provider, u64> {
        let mut counts = BTreeMap::new();
        for record in &self.failed_requests {
            *counts.entry(record.provider).or_insert(0) += 1;
        }
        counts
    }

    pub fn failures_by_kind(&self) -> BTreeMap<ErrorKind, u64> {
        let mut counts = BTreeMap::new();
        for record in &self.failed_requests {
            *counts.entry(record.error_kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `checkpoint` - The saved checkpoint to report alongside
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    checkpoint: CheckpointLog,
) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        items: storage.count_items()?,
        tags: storage.count_lookup(LookupKind::Tag)?,
        genres: storage.count_lookup(LookupKind::Genre)?,
        categories: storage.count_lookup(LookupKind::Category)?,
        ineligible: storage.list_ineligible()?.len() as u64,
        over_threshold: storage.list_over_threshold()?.len() as u64,
        failed_requests: storage.list_failed_requests()?,
        checkpoint,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Catalog:");
    println!("  Items: {}", stats.items);
    println!("  Tags: {}", stats.tags);
    println!("  Genres: {}", stats.genres);
    println!("  Categories: {}", stats.categories);
    println!();

    println!("Outcome Logs:");
    println!("  Ineligible: {}", stats.ineligible);
    println!("  Over threshold: {}", stats.over_threshold);
    println!("  Failed requests: {}", stats.failed_requests.len());
    for (provider, count) in stats.failures_by_provider() {
        println!("    {}: {}", provider, count);
    }
    for (kind, count) in stats.failures_by_kind() {
        let class = if kind.is_hard() { "hard" } else { "soft" };
        println!("    {} ({}): {}", kind, class, count);
    }
    println!();

    let checkpoint = &stats.checkpoint;
    println!("Checkpoint:");
    println!("  Next index: {}", checkpoint.last_processed_index);
    println!("  Store requests used: {}", checkpoint.store_request_count);
    println!("  Master list fetched: {}", checkpoint.master_list_fetched);
    if let Some(at) = checkpoint.last_store_request_at {
        println!("  Last store request: {}", at.to_rfc3339());
    }
    if checkpoint.store_request_count_reset {
        println!("  Request count resets on next run");
    }
    if checkpoint.reset_log {
        println!("  Pass complete; next run starts over");
    }
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  Id: {}", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Outcomes: {} updated, {} ineligible, {} over threshold, {} failed, {} ignored",
            run.updated, run.ineligible, run.over_threshold, run.failed, run.ignored
        );
        println!("  Store requests: {}", run.requests_used);
        println!();
    }

    if !stats.failed_requests.is_empty() {
        println!("Failed Requests:");
        println!("  {:<32} {:>6} {:>10}  provider", "kind", "status", "id");
        for record in &stats.failed_requests {
            let status = record
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<32} {:>6} {:>10}  {}",
                record.error_kind.to_db_string(),
                status,
                record.id,
                record.provider
            );
        }
    }
}
