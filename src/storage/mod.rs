//! Storage module for persisting catalog data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent merge of item records and their tag/genre/category relations
//! - Ineligible, over-threshold and failed-request logs
//! - Cached master list and run history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::fetch::ErrorKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One entry of the authoritative catalog enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterListEntry {
    pub id: i64,
    pub name: String,
}

/// Screenshot reference as published by the store provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: i64,
    pub path_thumbnail: String,
    pub path_full: String,
}

/// The merged, persisted representation of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub name: String,
    /// Price in the provider's minor currency unit
    pub price: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub coming_soon: bool,
    pub developers: Vec<String>,
    pub publishers: Vec<String>,
    /// Midpoint of the reported ownership range
    pub owner_count: i64,
    pub positive_reviews: i64,
    pub negative_reviews: i64,
    /// Percentage of positive reviews, `None` without any review
    pub rating: Option<u8>,
    pub about_the_game: String,
    pub short_description: String,
    pub detailed_description: String,
    pub website: Option<String>,
    pub header_image: String,
    pub screenshots: Vec<Screenshot>,
    pub languages: String,
    pub windows: bool,
    pub mac: bool,
    pub linux: bool,
    /// Tag name -> vote count
    pub tags: BTreeMap<String, i64>,
    /// Genre name -> provider id
    pub genres: BTreeMap<String, i64>,
    /// Category name -> provider id
    pub categories: BTreeMap<String, i64>,
}

/// The two per-id data providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Ownership range, price, review counts, tag votes
    Stats,
    /// Store details behind a `{id: {success, data}}` envelope
    Store,
}

impl Provider {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::Store => "store",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "stats" => Some(Self::Stats),
            "store" => Some(Self::Store),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// One unresolved failure, keyed by item id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRequestRecord {
    pub id: i64,
    pub provider: Provider,
    pub error_kind: ErrorKind,
    pub status_code: Option<u16>,
}

/// Lookup tables backing the many-valued relations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Tag,
    Genre,
    Category,
}

impl LookupKind {
    pub fn all() -> [Self; 3] {
        [Self::Tag, Self::Genre, Self::Category]
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Genre => "genres",
            Self::Category => "categories",
        }
    }

    pub fn relation_table(&self) -> &'static str {
        match self {
            Self::Tag => "item_tags",
            Self::Genre => "item_genres",
            Self::Category => "item_categories",
        }
    }

    pub fn relation_column(&self) -> &'static str {
        match self {
            Self::Tag => "tag_id",
            Self::Genre => "genre_id",
            Self::Category => "category_id",
        }
    }
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub updated: u64,
    pub ineligible: u64,
    pub over_threshold: u64,
    pub failed: u64,
    pub ignored: u64,
    pub requests_used: u64,
    pub next_index: u64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    BudgetReached,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::BudgetReached => "budget_reached",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "budget_reached" => Some(Self::BudgetReached),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
