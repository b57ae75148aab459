//! State module for tracking ingestion progress
//!
//! This module provides state management for items and for the run as a whole.
//!
//! # Components
//!
//! - `ItemState`: The states a single item moves through during ingestion
//! - `ItemOutcome`: The terminal result of ingesting one item
//! - `CheckpointLog`: Durable progress and counters, persisted by a `CheckpointStore`

mod checkpoint;
mod item_state;

// Re-export main types
pub use checkpoint::{CheckpointError, CheckpointLog, CheckpointStore, Counters, JsonCheckpointStore};
pub use item_state::{ItemOutcome, ItemState};
