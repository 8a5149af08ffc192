use async_trait::async_trait;

use crate::models::{AddDownloadOptions, DownloadHandle, DownloadStatus};
use crate::Result;

/// Core download-client interface.
///
/// The pipeline only needs to hand a link to the client, poll its progress,
/// and remove it again; everything else stays behind the concrete client.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Add a new download, returning the client's handle for it.
    async fn add_download(&self, options: AddDownloadOptions) -> Result<DownloadHandle>;

    /// Progress and liveness for a previously added download.
    async fn get_status(&self, handle: DownloadHandle) -> Result<DownloadStatus>;

    /// Remove a download, optionally deleting its files.
    async fn remove(&self, handle: DownloadHandle, delete_files: bool) -> Result<()>;

    /// Client type name, for logging.
    fn downloader_type(&self) -> &'static str;
}
