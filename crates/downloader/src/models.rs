use serde::{Deserialize, Serialize};

/// Identifier assigned by the external download client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHandle(pub i64);

impl std::fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Progress snapshot for a tracked download.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    /// Completion in the range 0.0..=1.0
    pub progress: f64,
    /// Whether the client is still working on it
    pub running: bool,
}

/// Options for adding a download
#[derive(Debug, Clone, Default)]
pub struct AddDownloadOptions {
    /// Torrent URL or magnet link
    pub url: String,
    /// Target directory on the client side
    pub download_dir: Option<String>,
}

impl AddDownloadOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn download_dir(mut self, dir: impl Into<String>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }
}
