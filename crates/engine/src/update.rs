use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::models::Subscription;
use crate::notifier::Notifier;
use crate::progress::{ProgressSink, Severity};
use crate::repositories::SubscriptionRepository;
use crate::scheduler::{CycleResult, CycleRunner};
use crate::status::StatusTable;

/// Attempts per subscription within one cycle before it is declared failed.
pub const SUBSCRIPTION_RETRY_LIMIT: u32 = 3;

/// What one full pass over all subscriptions produced.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub new_downloads: usize,
    /// (subscription name, error message) for every subscription that
    /// exhausted its retries.
    pub errors: Vec<(String, String)>,
}

/// Runs the full update cycle: every subscription sequentially, each behind
/// a bounded retry, one failure never aborting the batch.
pub struct UpdateService {
    db: SqlitePool,
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<Notifier>,
    status: Arc<StatusTable>,
    progress: Arc<ProgressSink>,
}

impl UpdateService {
    pub fn new(
        db: SqlitePool,
        dispatcher: Arc<Dispatcher>,
        notifier: Arc<Notifier>,
        status: Arc<StatusTable>,
        progress: Arc<ProgressSink>,
    ) -> Self {
        Self {
            db,
            dispatcher,
            notifier,
            status,
            progress,
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, sqlx::Error> {
        let subscriptions = SubscriptionRepository::list(&self.db).await?;
        tracing::info!("Update cycle over {} subscriptions", subscriptions.len());

        let mut outcome = CycleOutcome::default();
        for sub in &subscriptions {
            match self.update_with_retry(sub).await {
                Ok(count) => outcome.new_downloads += count,
                Err(e) => {
                    let message = e.to_string();
                    tracing::error!("Subscription {} failed: {}", sub.name, message);
                    self.status.mark_error(&sub.name);
                    self.notifier.notify_subscription_error(&sub.name, &message).await;
                    outcome.errors.push((sub.name.clone(), message));
                }
            }
        }

        // Status entries exist iff the subscription still does.
        let names: HashSet<String> = subscriptions.iter().map(|s| s.name.clone()).collect();
        self.status.prune(&names);

        if outcome.errors.is_empty() {
            if self.status.error_message().is_some() {
                self.status.clear_error_message();
                self.notifier.notify_recovered().await;
                self.progress.notify("all subscriptions recovered", Severity::Success);
            }
            if outcome.new_downloads > 0 {
                self.progress.notify(
                    format!("{} new downloads", outcome.new_downloads),
                    Severity::Success,
                );
            } else {
                self.progress.notify("no updates found", Severity::Info);
            }
        } else {
            let banner = outcome
                .errors
                .iter()
                .map(|(name, error)| format!("{name}: {error}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.status.set_error_message(&banner);
            self.progress.notify(banner, Severity::Error);
        }

        Ok(outcome)
    }

    async fn update_with_retry(&self, sub: &Subscription) -> Result<usize, DispatchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dispatcher.update_one(sub).await {
                Ok(dispatched) => return Ok(dispatched.len()),
                Err(e) if attempt >= SUBSCRIPTION_RETRY_LIMIT => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Subscription {} attempt {}/{} failed: {}",
                        sub.name,
                        attempt,
                        SUBSCRIPTION_RETRY_LIMIT,
                        e
                    );
                }
            }
        }
    }
}

#[async_trait]
impl CycleRunner for UpdateService {
    async fn execute(&self) -> CycleResult {
        self.run_cycle().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use chrono::Offset;

    use downloader::Downloader;
    use webhook::WebhookPost;

    use crate::config::WebhookEndpoint;
    use crate::db::create_pool;
    use crate::fetch::{FetchError, PageFetch, PageResponse};
    use crate::testing::{page_body, torrent_url_for, MockDownloader, MockWebhookPost, RoutedFetcher};

    struct Harness {
        service: UpdateService,
        fetcher: Arc<RoutedFetcher>,
        downloader: Arc<MockDownloader>,
        sender: Arc<MockWebhookPost>,
        status: Arc<StatusTable>,
        db: SqlitePool,
        _webhook_dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let db = create_pool("sqlite::memory:").await.unwrap();
        let fetcher = Arc::new(RoutedFetcher::new());
        let downloader = Arc::new(MockDownloader::new());
        let sender = Arc::new(MockWebhookPost::new());
        let status = Arc::new(StatusTable::new(chrono::Utc.fix()));
        let progress = Arc::new(ProgressSink::new());
        let webhook_dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(Notifier::new(
            vec![WebhookEndpoint {
                name: "hook".into(),
                kind: "slack".into(),
                url: "http://hooks/x".into(),
                enabled: true,
            }],
            webhook::TemplateStore::new(webhook_dir.path()).unwrap(),
            Arc::clone(&sender) as Arc<dyn WebhookPost>,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            db.clone(),
            Arc::clone(&fetcher) as Arc<dyn PageFetch>,
            Arc::new(extract::TemplateStore::builtin()),
            Some(Arc::clone(&downloader) as Arc<dyn Downloader>),
            Arc::clone(&notifier),
            Arc::clone(&status),
            Arc::clone(&progress),
            PathBuf::from("/downloads"),
            true,
        ));
        let service = UpdateService::new(
            db.clone(),
            dispatcher,
            notifier,
            Arc::clone(&status),
            progress,
        );

        Harness {
            service,
            fetcher,
            downloader,
            sender,
            status,
            db,
            _webhook_dir: webhook_dir,
        }
    }

    async fn add_sub(db: &SqlitePool, name: &str) -> Subscription {
        let sub = Subscription::new(name, format!("http://x/{name}"));
        SubscriptionRepository::upsert(db, &sub).await.unwrap();
        sub
    }

    fn transport_error(name: &str) -> FetchError {
        FetchError {
            url: format!("http://x/{name}?page=1"),
            message: "connection refused".into(),
        }
    }

    #[tokio::test]
    async fn test_failing_subscription_does_not_stop_the_batch() {
        let h = harness().await;
        add_sub(&h.db, "a").await;
        add_sub(&h.db, "b").await;
        add_sub(&h.db, "c").await;

        h.fetcher.script(
            "http://x/a",
            vec![Ok(PageResponse::Page(page_body(&["a1"]))), Ok(PageResponse::End)],
        );
        // b fails every attempt, past the retry limit.
        h.fetcher.script(
            "http://x/b",
            (0..SUBSCRIPTION_RETRY_LIMIT).map(|_| Err(transport_error("b"))).collect(),
        );
        h.fetcher.script(
            "http://x/c",
            vec![Ok(PageResponse::Page(page_body(&["c1"]))), Ok(PageResponse::End)],
        );

        let outcome = h.service.run_cycle().await.unwrap();
        assert_eq!(outcome.new_downloads, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].0, "b");

        assert_eq!(
            h.downloader.added_urls(),
            ["a1", "c1"].map(torrent_url_for)
        );

        // The banner names only the failing subscription.
        let banner = h.status.error_message().unwrap();
        assert!(banner.contains("b:"));
        assert!(!banner.contains("a:"));
        assert!(!banner.contains("c:"));
        assert!(h.status.get("b").unwrap().last_error);
    }

    #[tokio::test]
    async fn test_retry_within_cycle_recovers_transient_failures() {
        let h = harness().await;
        add_sub(&h.db, "a").await;

        // Two failed attempts, then a clean crawl on the third.
        h.fetcher.script(
            "http://x/a",
            vec![
                Err(transport_error("a")),
                Err(transport_error("a")),
                Ok(PageResponse::Page(page_body(&["a1"]))),
                Ok(PageResponse::End),
            ],
        );

        let outcome = h.service.run_cycle().await.unwrap();
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.new_downloads, 1);
    }

    #[tokio::test]
    async fn test_clean_cycle_clears_error_and_notifies_recovery() {
        let h = harness().await;
        add_sub(&h.db, "a").await;

        h.fetcher.script(
            "http://x/a",
            (0..SUBSCRIPTION_RETRY_LIMIT).map(|_| Err(transport_error("a"))).collect(),
        );
        h.service.run_cycle().await.unwrap();
        assert!(h.status.error_message().is_some());
        // One error notification.
        assert_eq!(h.sender.posted_urls().len(), 1);

        // Next cycle: the (unscripted) source simply answers the end
        // sentinel, a clean no-op.
        let outcome = h.service.run_cycle().await.unwrap();
        assert!(outcome.errors.is_empty());
        assert_eq!(h.status.error_message(), None);
        // Error notification + recovered notification.
        assert_eq!(h.sender.posted_urls().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_error_notifies_once_per_condition() {
        let h = harness().await;
        add_sub(&h.db, "a").await;

        for _ in 0..2 {
            h.fetcher.script(
                "http://x/a",
                (0..SUBSCRIPTION_RETRY_LIMIT).map(|_| Err(transport_error("a"))).collect(),
            );
            h.service.run_cycle().await.unwrap();
        }

        // Same failure in both cycles: a single error notification.
        assert_eq!(h.sender.posted_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_status_pruned_to_stored_subscriptions() {
        let h = harness().await;
        add_sub(&h.db, "a").await;
        h.fetcher.script(
            "http://x/a",
            vec![Ok(PageResponse::Page(page_body(&["a1"]))), Ok(PageResponse::End)],
        );
        h.service.run_cycle().await.unwrap();
        assert!(h.status.get("a").is_some());

        SubscriptionRepository::delete(&h.db, "a").await.unwrap();
        h.service.run_cycle().await.unwrap();
        assert!(h.status.get("a").is_none());
    }
}
