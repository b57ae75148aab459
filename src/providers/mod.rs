//! Provider payloads and field mapping
//!
//! This module contains:
//! - Typed payloads for the master list, stats and store endpoints
//! - Pure parsing of ownership ranges, ratings and release dates
//! - Assembly of a merged `ItemRecord` from both providers

mod de;
mod master_list;
mod stats;
mod store;

pub use master_list::{AppEntry, AppList, MasterListResponse};
pub use stats::{compute_rating, parse_owner_range, OwnerRange, StatsFields, StatsPayload};
pub use store::{
    parse_release_date, StoreData, StoreEnvelope, StoreFields, StoreLookup, StorePlatforms,
    StoreReleaseDate, StoreResponse, StoreScreenshot,
};

use crate::storage::{ItemRecord, MasterListEntry};

/// Builds the merged record for one item
///
/// The store name wins when present; otherwise the master list name is kept.
pub fn assemble_item(entry: &MasterListEntry, stats: StatsFields, store: StoreFields) -> ItemRecord {
    let StatsFields {
        price,
        owners,
        positive_reviews,
        negative_reviews,
        rating,
        tags,
    } = stats;
    let StoreFields {
        name,
        release_date,
        coming_soon,
        developers,
        publishers,
        about_the_game,
        short_description,
        detailed_description,
        website,
        header_image,
        screenshots,
        languages,
        windows,
        mac,
        linux,
        genres,
        categories,
    } = store;

    let name = if name.trim().is_empty() {
        entry.name.clone()
    } else {
        name
    };

    ItemRecord {
        id: entry.id,
        name,
        price,
        release_date,
        coming_soon,
        developers,
        publishers,
        owner_count: owners.midpoint(),
        positive_reviews,
        negative_reviews,
        rating,
        about_the_game,
        short_description,
        detailed_description,
        website,
        header_image,
        screenshots,
        languages,
        windows,
        mac,
        linux,
        tags,
        genres,
        categories,
    }
}
