//! Record Model
//!
//! A `Port` is one catalog entry: the identifier it is stored under and the
//! details decoded from the feed. Details fields are all optional; absent
//! fields are skipped when serializing so stored and transported records only
//! carry what the feed provided.

use serde::{Deserialize, Deserializer, Serialize};

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Storage key. Non-empty; ordering is byte-lexicographic.
    pub id: String,

    pub details: PortDetails,
}

impl Port {
    pub fn new(id: impl Into<String>, details: PortDetails) -> Self {
        Self {
            id: id.into(),
            details,
        }
    }
}

/// Attributes of a port as delivered by the catalog feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub alias: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub regions: Vec<String>,

    /// (longitude, latitude)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<[f64; 2]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// UN/LOCODE identifiers
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_as_empty")]
    pub unlocs: Vec<String>,

    /// Feed-assigned port code. Usually a quoted number; a bare number is
    /// kept in its decimal text form.
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "code_as_text")]
    pub code: Option<String>,
}

/// Lists given as `null` read as empty, like missing ones
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Text(String),
    Number(serde_json::Number),
}

fn code_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<CodeRepr>::deserialize(deserializer)?.map(|code| match code {
        CodeRepr::Text(text) => text,
        CodeRepr::Number(number) => number.to_string(),
    }))
}
