use serde::{Deserialize, Serialize};

/// One candidate item extracted from a feed page.
///
/// Transient: produced by the extractor and consumed immediately by the
/// dispatcher. Only `torrent_url` is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Display title of the item
    pub title: String,
    /// Item page link / guid
    pub guid: String,
    /// Resolved download-target URL (the enclosure link)
    pub torrent_url: String,
    /// Item description, kept as raw markup
    pub description: String,
}

impl FeedItem {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn torrent_url(&self) -> &str {
        &self.torrent_url
    }
}
