use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use extract::FeedItem;

/// A user-defined feed source.
///
/// `include_words` / `exclude_words` are whitespace-separated substrings
/// matched against item titles, stored in the same TEXT form the user typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub include_words: String,
    #[serde(default)]
    pub exclude_words: String,
}

impl Subscription {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            include_words: String::new(),
            exclude_words: String::new(),
        }
    }

    pub fn include_words(&self) -> impl Iterator<Item = &str> {
        self.include_words.split_whitespace()
    }

    pub fn exclude_words(&self) -> impl Iterator<Item = &str> {
        self.exclude_words.split_whitespace()
    }
}

/// Ledger entry for a dispatched enclosure link. The unique `url` is the
/// at-most-once dedup key; `handle` is lazily bound to the download client's
/// identifier and may be cleared again when the client side is removed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DownloadRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub handle: Option<i64>,
}

/// One newly dispatched item, as reported by a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedItem {
    pub subscription: String,
    pub item: FeedItem,
}
