//! Durable ingestion progress
//!
//! The checkpoint is the only source of truth for where a restarted run
//! resumes. Everything before `last_processed_index` is durably merged or
//! durably recorded as ineligible, over threshold or failed.

use crate::state::ItemOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading or saving a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt checkpoint {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Per-pass outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub updated: u64,
    pub ineligible: u64,
    pub ignored: u64,
    pub failed_requests: u64,
    pub over_threshold: u64,
}

/// Process-wide ingestion progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointLog {
    /// Master list positions already handled; the next item to process
    pub last_processed_index: u64,
    /// Store requests issued in the current budget window
    pub store_request_count: u64,
    /// Zero the request count when the next run starts
    pub store_request_count_reset: bool,
    pub master_list_fetched: bool,
    pub last_store_request_at: Option<DateTime<Utc>>,
    pub counters: Counters,
    /// A full pass finished; start the next run from scratch
    pub reset_log: bool,
}

impl CheckpointLog {
    /// Applies the transitions requested by the previous run
    pub fn begin_run(&mut self) {
        if self.reset_log {
            *self = Self {
                master_list_fetched: self.master_list_fetched,
                last_store_request_at: self.last_store_request_at,
                ..Self::default()
            };
        }
        if self.store_request_count_reset {
            self.store_request_count = 0;
            self.store_request_count_reset = false;
        }
    }

    pub fn record_store_request(&mut self, at: DateTime<Utc>) {
        self.store_request_count += 1;
        self.last_store_request_at = Some(at);
    }

    pub fn record_outcome(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Merged => self.counters.updated += 1,
            ItemOutcome::Ineligible => self.counters.ineligible += 1,
            ItemOutcome::OverThreshold { .. } => self.counters.over_threshold += 1,
            ItemOutcome::Failed { .. } => self.counters.failed_requests += 1,
            ItemOutcome::Ignored => self.counters.ignored += 1,
        }
    }

    pub fn budget_exhausted(&self, budget: u64) -> bool {
        self.store_request_count >= budget
    }

    /// The run stopped on its request budget; resume here with a fresh count
    pub fn mark_budget_reached(&mut self) {
        self.store_request_count_reset = true;
    }

    /// The whole master list was handled
    pub fn mark_pass_complete(&mut self) {
        self.reset_log = true;
    }
}

/// Persistence for the checkpoint log
pub trait CheckpointStore {
    /// Loads the saved log, or the default log if none was saved yet
    fn load(&self) -> Result<CheckpointLog, CheckpointError>;

    /// Atomically replaces the saved log
    fn save(&self, log: &CheckpointLog) -> Result<(), CheckpointError>;
}

/// Checkpoint kept as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the checkpoint file; a missing file is not an error
    pub fn remove(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> Result<CheckpointLog, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CheckpointLog::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|source| CheckpointError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, log: &CheckpointLog) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_vec_pretty(log).map_err(CheckpointError::Encode)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
