use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, FixedOffset};

use extract::FeedItem;

/// Last-poll snapshot for one subscription. Process-lifetime only; never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub title: String,
    pub link: String,
    pub torrent_url: String,
    pub polled_at: Option<DateTime<FixedOffset>>,
    pub last_error: bool,
}

/// Poll status per subscription plus the process-wide error banner.
///
/// Owned by the application state and passed by reference; mutated only from
/// the orchestrating context, so the locks are held for map operations only.
pub struct StatusTable {
    timezone: FixedOffset,
    entries: RwLock<HashMap<String, SubscriptionStatus>>,
    error_message: RwLock<Option<String>>,
}

impl StatusTable {
    pub fn new(timezone: FixedOffset) -> Self {
        Self {
            timezone,
            entries: RwLock::new(HashMap::new()),
            error_message: RwLock::new(None),
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        chrono::Utc::now().with_timezone(&self.timezone)
    }

    /// Record the most recently seen item and stamp the poll time.
    pub fn update(&self, name: &str, item: &FeedItem) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            name.to_string(),
            SubscriptionStatus {
                title: item.title.clone(),
                link: item.guid.clone(),
                torrent_url: item.torrent_url.clone(),
                polled_at: Some(self.now()),
                last_error: false,
            },
        );
    }

    /// Flag the last poll as failed, stamping the poll time; an unknown name
    /// gets a fresh errored entry.
    pub fn mark_error(&self, name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(name.to_string()).or_default();
        entry.polled_at = Some(self.now());
        entry.last_error = true;
    }

    pub fn get(&self, name: &str) -> Option<SubscriptionStatus> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Drop entries whose subscription no longer exists.
    pub fn prune(&self, keep: &HashSet<String>) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|name, _| keep.contains(name));
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        *self.error_message.write().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn clear_error_message(&self) {
        *self.error_message.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use chrono::Utc;

    fn table() -> StatusTable {
        StatusTable::new(Utc.fix())
    }

    fn item(title: &str) -> FeedItem {
        FeedItem {
            title: title.into(),
            guid: format!("http://example.com/{title}"),
            torrent_url: format!("http://example.com/{title}.torrent"),
            description: String::new(),
        }
    }

    #[test]
    fn test_update_then_error_keeps_item_fields() {
        let table = table();
        table.update("show", &item("ep1"));
        table.mark_error("show");

        let status = table.get("show").unwrap();
        assert_eq!(status.title, "ep1");
        assert!(status.last_error);
        assert!(status.polled_at.is_some());
    }

    #[test]
    fn test_error_on_unknown_name_creates_entry() {
        let table = table();
        table.mark_error("ghost");
        let status = table.get("ghost").unwrap();
        assert!(status.last_error);
        assert_eq!(status.title, "");
    }

    #[test]
    fn test_prune_drops_deleted_subscriptions() {
        let table = table();
        table.update("a", &item("x"));
        table.update("b", &item("y"));
        table.prune(&HashSet::from(["a".to_string()]));
        assert!(table.get("a").is_some());
        assert!(table.get("b").is_none());
    }

    #[test]
    fn test_error_message_set_and_clear() {
        let table = table();
        assert_eq!(table.error_message(), None);
        table.set_error_message("boom");
        assert_eq!(table.error_message().as_deref(), Some("boom"));
        table.clear_error_message();
        assert_eq!(table.error_message(), None);
    }
}
