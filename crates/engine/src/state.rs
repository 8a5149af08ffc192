use std::sync::Arc;

use reqwest::Client;
use sqlx::SqlitePool;

use downloader::{Downloader, TransmissionDownloader};
use transmission::TransmissionClient;
use webhook::{HttpWebhookPost, WebhookPost};

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::fetch::{HttpPageFetcher, PageFetch};
use crate::notifier::Notifier;
use crate::progress::ProgressSink;
use crate::scheduler::{CycleRunner, SchedulerHandle, UpdateScheduler};
use crate::status::StatusTable;
use crate::update::UpdateService;

/// Everything the process surface needs to drive the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub status: Arc<StatusTable>,
    pub progress: Arc<ProgressSink>,
    pub notifier: Arc<Notifier>,
    pub update: Arc<UpdateService>,
    pub scheduler: SchedulerHandle,
}

impl AppState {
    /// Wire the pipeline together and spawn the scheduler actor.
    pub fn new(
        db: SqlitePool,
        config: Config,
        extract_templates: extract::TemplateStore,
        webhook_templates: webhook::TemplateStore,
    ) -> Self {
        let http_client = Client::new();

        let status = Arc::new(StatusTable::new(config.timezone()));
        let progress = Arc::new(ProgressSink::new());

        let sender: Arc<dyn WebhookPost> = Arc::new(HttpWebhookPost::new(http_client.clone()));
        let notifier = Arc::new(Notifier::new(
            config.webhooks.clone(),
            webhook_templates,
            sender,
        ));

        let client: Option<Arc<dyn Downloader>> = if config.without_transmission {
            tracing::info!("Standalone mode: download-client calls disabled");
            None
        } else {
            let transmission = TransmissionClient::new(
                http_client,
                config.transmission.rpc_url(),
                config.transmission.auth(),
            );
            Some(Arc::new(TransmissionDownloader::new(transmission)))
        };

        let fetcher: Arc<dyn PageFetch> = Arc::new(HttpPageFetcher::new());
        let dispatcher = Arc::new(Dispatcher::new(
            db.clone(),
            fetcher,
            Arc::new(extract_templates),
            client,
            Arc::clone(&notifier),
            Arc::clone(&status),
            Arc::clone(&progress),
            config.download_dir.clone(),
            config.auto_page,
        ));

        let update = Arc::new(UpdateService::new(
            db.clone(),
            dispatcher,
            Arc::clone(&notifier),
            Arc::clone(&status),
            Arc::clone(&progress),
        ));

        let scheduler = UpdateScheduler::spawn(Arc::clone(&update) as Arc<dyn CycleRunner>);

        Self {
            db,
            config: Arc::new(config),
            status,
            progress,
            notifier,
            update,
            scheduler,
        }
    }
}
