use async_trait::async_trait;

use transmission::TransmissionClient;

use crate::models::{AddDownloadOptions, DownloadHandle, DownloadStatus};
use crate::traits::Downloader;
use crate::{DownloaderError, Result};

/// Transmission-backed [`Downloader`].
pub struct TransmissionDownloader {
    client: TransmissionClient,
}

impl TransmissionDownloader {
    pub fn new(client: TransmissionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for TransmissionDownloader {
    async fn add_download(&self, options: AddDownloadOptions) -> Result<DownloadHandle> {
        let added = self
            .client
            .torrent_add(&options.url, options.download_dir.as_deref())
            .await?;
        tracing::debug!("Added torrent {} ({})", added.id, added.name);
        Ok(DownloadHandle(added.id))
    }

    async fn get_status(&self, handle: DownloadHandle) -> Result<DownloadStatus> {
        let torrent = self
            .client
            .torrent_get(handle.0)
            .await?
            .ok_or(DownloaderError::NotFound(handle.0))?;
        Ok(DownloadStatus {
            progress: torrent.percent_done,
            running: torrent.status.is_running(),
        })
    }

    async fn remove(&self, handle: DownloadHandle, delete_files: bool) -> Result<()> {
        self.client.torrent_remove(handle.0, delete_files).await?;
        Ok(())
    }

    fn downloader_type(&self) -> &'static str {
        "transmission"
    }
}
