/// Item state definitions for tracking ingestion progress
///
/// This module defines the states one item moves through during a run and the
/// terminal outcome it ends in.
use crate::fetch::ErrorKind;
use crate::storage::Provider;
use std::fmt;

/// Represents the current state of an item in the ingestion process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Item taken from the master list, not yet looked at
    Pending,

    /// Waiting on the stats provider
    FetchingStats,

    /// Checking the ownership range against the ceiling
    EligibilityCheck,

    /// Waiting on the store provider
    FetchingStore,

    /// Inspecting the store envelope
    Classifying,

    // ===== Terminal States =====
    /// Item record and relations written
    Merged,

    /// Wrong content type; never fetched again
    Ineligible,

    /// Too popular for now; fetched again on the next pass
    OverThreshold,

    /// A provider failure was recorded
    Failed,

    /// Skipped because of an earlier ineligible marker or hard failure
    Ignored,
}

impl ItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Merged | Self::Ineligible | Self::OverThreshold | Self::Failed | Self::Ignored
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FetchingStats => "fetching_stats",
            Self::EligibilityCheck => "eligibility_check",
            Self::FetchingStore => "fetching_store",
            Self::Classifying => "classifying",
            Self::Merged => "merged",
            Self::Ineligible => "ineligible",
            Self::OverThreshold => "over_threshold",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How one item's ingestion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Merged,
    Ineligible,
    OverThreshold {
        min_owners: i64,
    },
    Failed {
        provider: Provider,
        kind: ErrorKind,
        status: Option<u16>,
    },
    Ignored,
}

impl ItemOutcome {
    /// The terminal state this outcome corresponds to
    pub fn state(&self) -> ItemState {
        match self {
            Self::Merged => ItemState::Merged,
            Self::Ineligible => ItemState::Ineligible,
            Self::OverThreshold { .. } => ItemState::OverThreshold,
            Self::Failed { .. } => ItemState::Failed,
            Self::Ignored => ItemState::Ignored,
        }
    }
}
