use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Semaphore;

use downloader::{AddDownloadOptions, Downloader};
use extract::TemplateStore;

use crate::bridge;
use crate::crawler::{Crawl, CrawlError};
use crate::fetch::PageFetch;
use crate::models::{DispatchedItem, Subscription};
use crate::notifier::Notifier;
use crate::progress::{ProgressSink, Severity};
use crate::repositories::DownloadRepository;
use crate::status::StatusTable;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Consumes one subscription's crawl stream and turns unseen items into
/// ledger records, download-client calls and notifications.
pub struct Dispatcher {
    db: SqlitePool,
    fetcher: Arc<dyn PageFetch>,
    templates: Arc<TemplateStore>,
    /// Absent in standalone mode; the ledger and notifications still run.
    downloader: Option<Arc<dyn Downloader>>,
    notifier: Arc<Notifier>,
    status: Arc<StatusTable>,
    progress: Arc<ProgressSink>,
    /// Serializes the download/notify phase across all subscriptions. The
    /// crawl phase deliberately stays outside of it.
    dispatch_lock: Arc<Semaphore>,
    download_dir: PathBuf,
    auto_page: bool,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        fetcher: Arc<dyn PageFetch>,
        templates: Arc<TemplateStore>,
        downloader: Option<Arc<dyn Downloader>>,
        notifier: Arc<Notifier>,
        status: Arc<StatusTable>,
        progress: Arc<ProgressSink>,
        download_dir: PathBuf,
        auto_page: bool,
    ) -> Self {
        Self {
            db,
            fetcher,
            templates,
            downloader,
            notifier,
            status,
            progress,
            dispatch_lock: Arc::new(Semaphore::new(1)),
            download_dir,
            auto_page,
        }
    }

    /// Update one subscription: crawl, gate against the ledger, dispatch.
    ///
    /// The feed is assumed newest-first, so consumption stops at the first
    /// already-known enclosure link; everything buffered before that point is
    /// dispatched oldest-discovered-first.
    pub async fn update_one(
        &self,
        sub: &Subscription,
    ) -> Result<Vec<DispatchedItem>, DispatchError> {
        tracing::info!("Updating subscription {} ({})", sub.name, sub.url);

        let mut stream = {
            let fetcher = Arc::clone(&self.fetcher);
            let template = self.templates.for_url(&sub.url).clone();
            let subscription = sub.clone();
            let auto_page = self.auto_page;
            bridge::run_streaming(move || Crawl::new(fetcher, template, subscription, auto_page))
        };

        let mut pending = Vec::new();
        let mut first = true;
        while let Some(next) = stream.next().await {
            let item = next?;
            let known = DownloadRepository::exists(&self.db, &item.torrent_url).await?;
            if first {
                // The first item refreshes the status even on a no-op cycle,
                // so "last poll time" stays truthful.
                self.status.update(&sub.name, &item);
                first = false;
            }
            if known {
                tracing::info!(
                    "Subscription {} stops at known item: {}",
                    sub.name,
                    item.title
                );
                break;
            }
            pending.push(item);
        }
        // Dropping the stream abandons any crawl pages we no longer need.
        drop(stream);

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        // Oldest-discovered-first, and only one subscription's download/notify
        // phase at a time.
        pending.reverse();
        let _permit = self.dispatch_lock.acquire().await.expect("dispatch lock closed");

        let mut dispatched = Vec::new();
        for item in pending {
            if !DownloadRepository::insert_if_absent(&self.db, &item.torrent_url, None).await? {
                tracing::warn!(
                    "Skipping already-recorded item for {}: {}",
                    sub.name,
                    item.torrent_url
                );
                continue;
            }

            if let Some(client) = &self.downloader {
                let dir = self.download_dir.join(&sub.name);
                let options = AddDownloadOptions::new(&item.torrent_url)
                    .download_dir(dir.to_string_lossy());
                match client.add_download(options).await {
                    Ok(handle) => {
                        DownloadRepository::assign_handle(
                            &self.db,
                            &item.torrent_url,
                            Some(handle.0),
                        )
                        .await?;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Download-add failed for {} ({}): {}",
                            sub.name,
                            item.torrent_url,
                            e
                        );
                        self.progress.notify(
                            format!("{}: download-add failed for {}", sub.name, item.title),
                            Severity::Warn,
                        );
                    }
                }
            }

            self.notifier.notify_new_download(&sub.name, &item).await;
            self.progress.notify(
                format!("{}: new download {}", sub.name, item.title),
                Severity::Success,
            );
            tracing::info!("Dispatched {} for {}", item.title, sub.name);

            dispatched.push(DispatchedItem {
                subscription: sub.name.clone(),
                item,
            });
        }

        Ok(dispatched)
    }
}
