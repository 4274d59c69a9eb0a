use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier assigned by the external store.
///
/// PostgREST may send the key as a JSON number or a string; both are kept
/// as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for BookmarkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => BookmarkId(s),
            RawId::Number(n) => BookmarkId(n.to_string()),
        })
    }
}

/// Represents a saved bookmark row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A validated row ready to be written: trimmed title, normalized url, owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// Sorts a collection newest first, the order the view presents.
pub fn sort_newest_first(items: &mut [Bookmark]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
