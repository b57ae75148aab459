//! Ingestion module
//!
//! This module contains the ingestion pipeline, including:
//! - The per-item state machine driver
//! - The run controller with request budget and checkpointing
//! - The repair pass over recorded failures

mod controller;
mod item;

pub use controller::Controller;
pub use item::ItemIngestor;

use crate::state::ItemOutcome;
use crate::storage::RunStatus;
use serde::Serialize;
use std::fmt;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every remaining item was handled
    #[default]
    Completed,
    /// The store request budget was used up
    BudgetReached,
    /// A shutdown signal arrived
    Interrupted,
}

impl StopReason {
    pub fn run_status(&self) -> RunStatus {
        match self {
            Self::Completed => RunStatus::Completed,
            Self::BudgetReached => RunStatus::BudgetReached,
            Self::Interrupted => RunStatus::Interrupted,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::BudgetReached => "budget reached",
            Self::Interrupted => "interrupted",
        };
        write!(f, "{}", label)
    }
}

/// Counts by outcome for one run or repair pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub updated: u64,
    pub ineligible: u64,
    pub over_threshold: u64,
    pub failed: u64,
    pub ignored: u64,
    /// Store requests issued during this run
    pub requests_used: u64,
    pub stop_reason: StopReason,
    /// Master list position the next run starts from
    pub next_index: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Merged => self.updated += 1,
            ItemOutcome::Ineligible => self.ineligible += 1,
            ItemOutcome::OverThreshold { .. } => self.over_threshold += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::Ignored => self.ignored += 1,
        }
    }

    /// Items that reached a terminal state
    pub fn processed(&self) -> u64 {
        self.updated + self.ineligible + self.over_threshold + self.failed + self.ignored
    }
}
