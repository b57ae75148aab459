//! Stats provider payload and mapping
//!
//! The stats provider reports an ownership range, price, review counts and
//! tag votes for one item.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Raw stats response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub owners: String,
    #[serde(default, deserialize_with = "super::de::optional_i64")]
    pub price: Option<i64>,
    #[serde(default)]
    pub positive: i64,
    #[serde(default)]
    pub negative: i64,
    #[serde(default, deserialize_with = "super::de::tag_votes")]
    pub tags: BTreeMap<String, i64>,
}

/// Parsed `"N .. M"` ownership range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRange {
    pub min: i64,
    pub max: i64,
}

impl OwnerRange {
    pub fn midpoint(&self) -> i64 {
        (self.min + self.max) / 2
    }
}

fn parse_owner_bound(raw: &str) -> Option<i64> {
    let digits: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses a thousands-separated range such as `"10,000 .. 20,000"`
///
/// # Returns
///
/// `None` when the text is not two non-negative bounds around `..` with
/// `min <= max`
pub fn parse_owner_range(raw: &str) -> Option<OwnerRange> {
    let (min, max) = raw.split_once("..")?;
    let min = parse_owner_bound(min)?;
    let max = parse_owner_bound(max)?;
    (min <= max).then_some(OwnerRange { min, max })
}

/// Percentage of positive reviews, rounded; `None` without any review
pub fn compute_rating(positive: i64, negative: i64) -> Option<u8> {
    let total = positive + negative;
    if total <= 0 {
        return None;
    }
    let rating = (positive as f64 / total as f64 * 100.0).round();
    Some(rating.clamp(0.0, 100.0) as u8)
}

/// Stats fields in their merged shape
#[derive(Debug, Clone, PartialEq)]
pub struct StatsFields {
    pub price: Option<i64>,
    pub owners: OwnerRange,
    pub positive_reviews: i64,
    pub negative_reviews: i64,
    pub rating: Option<u8>,
    pub tags: BTreeMap<String, i64>,
}

impl StatsFields {
    pub fn from_payload(payload: StatsPayload, owners: OwnerRange) -> Self {
        let StatsPayload {
            owners: _,
            price,
            positive,
            negative,
            tags,
        } = payload;

        Self {
            price,
            owners,
            positive_reviews: positive,
            negative_reviews: negative,
            rating: compute_rating(positive, negative),
            tags,
        }
    }
}
