//! Master list payload
//!
//! The bulk endpoint answers `{"applist": {"apps": [{"appid": 10, "name": "..."}]}}`.

use crate::storage::MasterListEntry;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MasterListResponse {
    pub applist: AppList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppList {
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub appid: i64,
    #[serde(default, deserialize_with = "super::de::string_or_null")]
    pub name: String,
}

impl MasterListResponse {
    /// Entries in provider order, without the unnamed ones
    pub fn into_entries(self) -> Vec<MasterListEntry> {
        self.applist
            .apps
            .into_iter()
            .filter(|app| !app.name.trim().is_empty())
            .map(|app| MasterListEntry {
                id: app.appid,
                name: app.name,
            })
            .collect()
    }
}
