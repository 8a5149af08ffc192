use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};

use extract::FeedItem;
use webhook::{TemplateStore, WebhookPost};

use crate::config::WebhookEndpoint;

/// Concurrent posts per fan-out.
const NOTIFY_CONCURRENCY: usize = 4;

/// Fans one event out to every enabled webhook endpoint.
///
/// Delivery is best-effort and at-least-once at the cycle level: failures are
/// logged with enough context to diagnose and never retried, and one
/// endpoint's failure does not block the others.
pub struct Notifier {
    endpoints: Vec<WebhookEndpoint>,
    templates: TemplateStore,
    sender: Arc<dyn WebhookPost>,
    /// Last error message notified per subscription, so a repeating failure
    /// notifies once per distinct condition instead of once per cycle.
    last_errors: Mutex<HashMap<String, String>>,
}

impl Notifier {
    pub fn new(
        endpoints: Vec<WebhookEndpoint>,
        templates: TemplateStore,
        sender: Arc<dyn WebhookPost>,
    ) -> Self {
        Self {
            endpoints,
            templates,
            sender,
            last_errors: Mutex::new(HashMap::new()),
        }
    }

    /// Announce a newly dispatched item.
    pub async fn notify_new_download(&self, subscription: &str, item: &FeedItem) {
        self.broadcast(&item.title, subscription, &item.torrent_url).await;
    }

    /// Announce a subscription whose update kept failing. Deduplicated per
    /// distinct error message; returns whether anything was sent.
    pub async fn notify_subscription_error(&self, subscription: &str, message: &str) -> bool {
        {
            let mut last = self.last_errors.lock().unwrap_or_else(|e| e.into_inner());
            if last.get(subscription).map(String::as_str) == Some(message) {
                return false;
            }
            last.insert(subscription.to_string(), message.to_string());
        }
        self.broadcast(&format!("update failed: {message}"), subscription, "").await;
        true
    }

    /// Announce that a fully clean cycle followed an errored one.
    pub async fn notify_recovered(&self) {
        self.last_errors.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.broadcast("all subscriptions updated successfully", "recovered", "").await;
    }

    /// User-triggered delivery check against every enabled endpoint.
    pub async fn notify_test(&self) {
        self.broadcast("webhook test message", "test", "").await;
    }

    async fn broadcast(&self, title: &str, subscribe: &str, torrent: &str) {
        stream::iter(self.endpoints.iter().filter(|e| e.enabled))
            .for_each_concurrent(NOTIFY_CONCURRENCY, |endpoint| async move {
                let template = match self.templates.get(&endpoint.kind) {
                    Ok(template) => template,
                    Err(e) => {
                        tracing::warn!("Webhook {} skipped: {}", endpoint.name, e);
                        return;
                    }
                };
                let body = template.render(title, subscribe, torrent);
                match self.sender.post(&endpoint.url, body).await {
                    Ok(()) => {
                        tracing::info!("Webhook {} ({}) delivered", endpoint.name, endpoint.url);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Webhook {} ({} {}) failed: {}",
                            endpoint.name,
                            endpoint.kind,
                            endpoint.url,
                            e
                        );
                    }
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWebhookPost;

    fn endpoint(name: &str, url: &str, enabled: bool) -> WebhookEndpoint {
        WebhookEndpoint {
            name: name.into(),
            kind: "slack".into(),
            url: url.into(),
            enabled,
        }
    }

    fn item() -> FeedItem {
        FeedItem {
            title: "ep1".into(),
            guid: "http://example.com/ep1".into(),
            torrent_url: "http://example.com/ep1.torrent".into(),
            description: String::new(),
        }
    }

    fn templates() -> TemplateStore {
        let dir = tempfile::tempdir().unwrap();
        TemplateStore::new(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_hits_every_enabled_endpoint() {
        let sender = Arc::new(MockWebhookPost::new());
        let notifier = Notifier::new(
            vec![
                endpoint("a", "http://hooks/a", true),
                endpoint("b", "http://hooks/b", false),
                endpoint("c", "http://hooks/c", true),
            ],
            templates(),
            Arc::clone(&sender) as Arc<dyn WebhookPost>,
        );

        notifier.notify_new_download("show", &item()).await;

        let mut posted = sender.posted_urls();
        posted.sort();
        assert_eq!(posted, vec!["http://hooks/a", "http://hooks/c"]);
    }

    #[tokio::test]
    async fn test_one_failing_endpoint_does_not_block_others() {
        let sender = Arc::new(MockWebhookPost::failing_for(&["http://hooks/a"]));
        let notifier = Notifier::new(
            vec![
                endpoint("a", "http://hooks/a", true),
                endpoint("c", "http://hooks/c", true),
            ],
            templates(),
            Arc::clone(&sender) as Arc<dyn WebhookPost>,
        );

        notifier.notify_new_download("show", &item()).await;
        assert_eq!(sender.posted_urls(), vec!["http://hooks/c"]);
    }

    #[tokio::test]
    async fn test_unknown_template_kind_is_skipped() {
        let sender = Arc::new(MockWebhookPost::new());
        let mut bad = endpoint("a", "http://hooks/a", true);
        bad.kind = "nope".into();
        let notifier =
            Notifier::new(vec![bad], templates(), Arc::clone(&sender) as Arc<dyn WebhookPost>);

        notifier.notify_new_download("show", &item()).await;
        assert!(sender.posted_urls().is_empty());
    }

    #[tokio::test]
    async fn test_error_notification_deduplicates_per_condition() {
        let sender = Arc::new(MockWebhookPost::new());
        let notifier = Notifier::new(
            vec![endpoint("a", "http://hooks/a", true)],
            templates(),
            Arc::clone(&sender) as Arc<dyn WebhookPost>,
        );

        assert!(notifier.notify_subscription_error("show", "timeout").await);
        assert!(!notifier.notify_subscription_error("show", "timeout").await);
        assert_eq!(sender.posted_urls().len(), 1);

        // A different condition for the same subscription fires again.
        assert!(notifier.notify_subscription_error("show", "dns failure").await);
        assert_eq!(sender.posted_urls().len(), 2);

        // Recovery resets the dedup state.
        notifier.notify_recovered().await;
        assert!(notifier.notify_subscription_error("show", "dns failure").await);
    }
}
