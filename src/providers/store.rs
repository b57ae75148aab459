//! Store provider payload and mapping
//!
//! The store answers `{"<id>": {"success": bool, "data": {...}}}`. Only the
//! fields the catalog keeps are modelled; everything else is ignored.

use crate::storage::Screenshot;
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Store response keyed by the requested id
pub type StoreResponse = HashMap<String, StoreEnvelope>;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<StoreData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreData {
    #[serde(rename = "type", deserialize_with = "super::de::string_or_null")]
    pub kind: String,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub name: String,
    pub release_date: Option<StoreReleaseDate>,
    pub developers: Vec<String>,
    pub publishers: Vec<String>,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub about_the_game: String,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub short_description: String,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub detailed_description: String,
    pub website: Option<String>,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub header_image: String,
    pub screenshots: Vec<StoreScreenshot>,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub supported_languages: String,
    pub platforms: StorePlatforms,
    pub genres: Vec<StoreLookup>,
    pub categories: Vec<StoreLookup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreReleaseDate {
    pub coming_soon: bool,
    #[serde(deserialize_with = "super::de::string_or_null")]
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorePlatforms {
    pub windows: bool,
    pub mac: bool,
    pub linux: bool,
}

/// Genre or category; genre ids arrive as strings, category ids as numbers
#[derive(Debug, Clone, Deserialize)]
pub struct StoreLookup {
    #[serde(deserialize_with = "super::de::flexible_i64")]
    pub id: i64,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreScreenshot {
    #[serde(deserialize_with = "super::de::flexible_i64")]
    pub id: i64,
    #[serde(default)]
    pub path_thumbnail: String,
    #[serde(default)]
    pub path_full: String,
}

fn release_date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^(\d{1,2}) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec), (\d{4})$")
                .ok()
        })
        .as_ref()
}

/// Parses `"11 Feb, 2022"`; anything else is `None`
///
/// Month-only dates, quarters and free text ("Coming soon", "TBA") are not
/// guessed.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let captures = release_date_pattern()?.captures(raw.trim())?;
    let day: u32 = captures[1].parse().ok()?;
    let year: i32 = captures[3].parse().ok()?;
    let month = match &captures[2] {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn lookup_map(entries: Vec<StoreLookup>) -> BTreeMap<String, i64> {
    entries
        .into_iter()
        .filter(|entry| !entry.description.trim().is_empty())
        .map(|entry| (entry.description, entry.id))
        .collect()
}

/// Store fields in their merged shape
#[derive(Debug, Clone, PartialEq)]
pub struct StoreFields {
    pub name: String,
    pub release_date: Option<NaiveDate>,
    pub coming_soon: bool,
    pub developers: Vec<String>,
    pub publishers: Vec<String>,
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
    pub genres: BTreeMap<String, i64>,
    pub categories: BTreeMap<String, i64>,
}

impl StoreFields {
    pub fn from_data(data: StoreData) -> Self {
        let StoreData {
            kind: _,
            name,
            release_date,
            developers,
            publishers,
            about_the_game,
            short_description,
            detailed_description,
            website,
            header_image,
            screenshots,
            supported_languages,
            platforms,
            genres,
            categories,
        } = data;

        let release = release_date.unwrap_or_default();

        Self {
            name,
            release_date: parse_release_date(&release.date),
            coming_soon: release.coming_soon,
            developers,
            publishers,
            about_the_game,
            short_description,
            detailed_description,
            website: website.filter(|site| !site.trim().is_empty()),
            header_image,
            screenshots: screenshots
                .into_iter()
                .map(|shot| Screenshot {
                    id: shot.id,
                    path_thumbnail: shot.path_thumbnail,
                    path_full: shot.path_full,
                })
                .collect(),
            languages: supported_languages,
            windows: platforms.windows,
            mac: platforms.mac,
            linux: platforms.linux,
            genres: lookup_map(genres),
            categories: lookup_map(categories),
        }
    }
}
