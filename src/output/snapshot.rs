//! Freeze and thaw of the outcome logs
//!
//! A frozen directory holds `failed_requests.json` and `ineligible.json`, so
//! the logs survive a database rebuild and can be inspected by hand.

use crate::storage::{FailedRequestRecord, Storage};
use crate::HarvestError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub const FAILED_REQUESTS_FILE: &str = "failed_requests.json";
pub const INELIGIBLE_FILE: &str = "ineligible.json";

/// Rows written or restored by a snapshot operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub failed_requests: usize,
    pub ineligible: usize,
}

/// Writes both outcome logs into `dir`, creating it if needed
pub fn freeze(storage: &dyn Storage, dir: &Path) -> Result<SnapshotCounts, HarvestError> {
    fs::create_dir_all(dir)?;

    let failed = storage.list_failed_requests()?;
    fs::write(
        dir.join(FAILED_REQUESTS_FILE),
        serde_json::to_vec_pretty(&failed)?,
    )?;

    let ineligible = storage.list_ineligible()?;
    fs::write(dir.join(INELIGIBLE_FILE), serde_json::to_vec_pretty(&ineligible)?)?;

    tracing::info!(
        "Froze {} failed requests and {} ineligible ids into {}",
        failed.len(),
        ineligible.len(),
        dir.display()
    );

    Ok(SnapshotCounts {
        failed_requests: failed.len(),
        ineligible: ineligible.len(),
    })
}

/// Restores both outcome logs from `dir`
///
/// Missing or empty files are skipped with a warning. Restoring the same
/// snapshot twice has no further effect.
pub fn thaw(storage: &mut dyn Storage, dir: &Path) -> Result<SnapshotCounts, HarvestError> {
    let mut counts = SnapshotCounts::default();

    if let Some(failed) = read_snapshot::<Vec<FailedRequestRecord>>(&dir.join(FAILED_REQUESTS_FILE))? {
        for record in &failed {
            storage.record_failed_request(record)?;
        }
        counts.failed_requests = failed.len();
    }

    if let Some(ineligible) = read_snapshot::<Vec<i64>>(&dir.join(INELIGIBLE_FILE))? {
        for id in &ineligible {
            storage.record_ineligible(*id)?;
        }
        counts.ineligible = ineligible.len();
    }

    tracing::info!(
        "Thawed {} failed requests and {} ineligible ids from {}",
        counts.failed_requests,
        counts.ineligible,
        dir.display()
    );
    Ok(counts)
}

fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, HarvestError> {
    if !path.exists() {
        tracing::warn!("Snapshot file {} not found, skipping", path.display());
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        tracing::warn!("Snapshot file {} is empty, skipping", path.display());
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(&content)?))
}
