use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transmission error: {0}")]
    Transmission(#[from] transmission::TransmissionError),

    #[error("Download not found: {0}")]
    NotFound(i64),

    #[error("Downloader not configured")]
    NotConfigured,
}
