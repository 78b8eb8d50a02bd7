//! Reflect API payloads

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `null` decodes like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The authenticated user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectUser {
    /// User id
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    /// Account email
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    /// Display name
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Graphs the user can access, primary first
    #[serde(deserialize_with = "null_as_default")]
    pub graph_ids: Vec<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A graph (notes workspace)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectGraph {
    /// Graph id
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Graph name
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A highlight or note attached to a book
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectBookNote {
    /// Note kind (e.g. "highlight")
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub note_type: String,
    /// Page number
    pub page: Option<i64>,
    /// Location within the book
    pub location: Option<i64>,
    /// Highlighted text
    #[serde(deserialize_with = "null_as_default")]
    pub value: String,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A book synced into Reflect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectBook {
    /// Book id
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Amazon identifier
    pub asin: Option<String>,
    /// Title
    pub title: Option<String>,
    /// Authors
    #[serde(deserialize_with = "null_as_default")]
    pub authors: Vec<String>,
    /// Highlights and notes
    #[serde(deserialize_with = "null_as_default")]
    pub notes: Vec<ReflectBookNote>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A saved link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectLink {
    /// Link id
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Target URL
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Last update (ISO 8601)
    pub updated_at: Option<String>,
    /// Highlights
    #[serde(deserialize_with = "null_as_default")]
    pub highlights: Vec<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generic `{ "success": bool }` acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectSuccess {
    /// Whether the write was applied
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body for saving a link
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewLink {
    /// URL to save
    pub url: String,
    /// Title override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Highlights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

/// Body for appending to a daily note
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyNoteAppend {
    /// Text to append
    pub text: String,
    /// ISO 8601 date (YYYY-MM-DD); today when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Target list, e.g. "[[Reading]]"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
}

/// Body for creating a note
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewNote {
    /// Note subject/title
    pub subject: String,
    /// Markdown content
    pub content_markdown: String,
    /// Pin the note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}
