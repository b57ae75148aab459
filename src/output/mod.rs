//! Output module for harvest reports and snapshots
//!
//! This module handles:
//! - Printing run summaries and database statistics
//! - Freezing the outcome logs to JSON and thawing them back

pub mod snapshot;
pub mod stats;

pub use snapshot::{freeze, thaw, SnapshotCounts};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::ingest::RunSummary;

/// Prints the outcome counts of a finished run or repair pass
pub fn print_run_summary(label: &str, summary: &RunSummary) {
    println!("=== {} ===\n", label);
    println!("  Stopped: {}", summary.stop_reason);
    println!("  Updated: {}", summary.updated);
    println!("  Ineligible: {}", summary.ineligible);
    println!("  Over threshold: {}", summary.over_threshold);
    println!("  Failed: {}", summary.failed);
    println!("  Ignored: {}", summary.ignored);
    println!("  Store requests used: {}", summary.requests_used);
    println!("  Next index: {}", summary.next_index);
}
