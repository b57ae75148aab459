//! Lenient deserializers for provider payload quirks

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Float(f64),
    Str(String),
}

impl IntOrString {
    fn into_i64(self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(value),
            Self::Float(value) if value.is_finite() => Some(value.round() as i64),
            Self::Float(_) => None,
            Self::Str(value) => value.trim().parse().ok(),
        }
    }
}

/// An integer sent either as a number or as a numeric string
pub fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IntOrString::deserialize(deserializer)?;
    let shown = match &raw {
        IntOrString::Int(v) => v.to_string(),
        IntOrString::Float(v) => v.to_string(),
        IntOrString::Str(v) => v.clone(),
    };
    raw.into_i64()
        .ok_or_else(|| serde::de::Error::custom(format!("not an integer: {}", shown)))
}

/// An optional integer where `null`, `""` and non-numeric strings mean absent
pub fn optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<IntOrString>::deserialize(deserializer)?;
    Ok(raw.and_then(IntOrString::into_i64))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagVotes {
    Map(BTreeMap<String, i64>),
    Other(serde_json::Value),
}

/// Tag votes; an item without tags arrives as `[]` instead of `{}`
pub fn tag_votes<'de, D>(deserializer: D) -> Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match TagVotes::deserialize(deserializer)? {
        TagVotes::Map(votes) => Ok(votes),
        TagVotes::Other(serde_json::Value::Array(items)) if items.is_empty() => {
            Ok(BTreeMap::new())
        }
        TagVotes::Other(serde_json::Value::Null) => Ok(BTreeMap::new()),
        TagVotes::Other(other) => Err(serde::de::Error::custom(format!(
            "unexpected tag votes: {}",
            other
        ))),
    }
}

/// A string that may be sent as `null`
pub fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
