mod error;
mod models;
mod traits;
mod transmission_impl;

pub use error::DownloaderError;
pub use models::{AddDownloadOptions, DownloadHandle, DownloadStatus};
pub use traits::Downloader;
pub use transmission_impl::TransmissionDownloader;

/// Result type alias for downloader operations
pub type Result<T> = std::result::Result<T, DownloaderError>;
