use serde::{Deserialize, Serialize};

/// Generic Transmission RPC envelope.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<T: Serialize> {
    pub method: &'static str,
    pub arguments: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub result: String,
    pub arguments: Option<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddTorrentArgs<'a> {
    pub filename: &'a str,
    #[serde(rename = "download-dir", skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddTorrentResponse {
    #[serde(rename = "torrent-added")]
    pub torrent_added: Option<TorrentAdded>,
    // Re-adding a known torrent succeeds with this field instead.
    #[serde(rename = "torrent-duplicate")]
    pub torrent_duplicate: Option<TorrentAdded>,
}

/// Identity of a torrent accepted by the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentAdded {
    pub id: i64,
    #[serde(rename = "hashString")]
    pub hash_string: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetTorrentArgs {
    pub ids: Vec<i64>,
    pub fields: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetTorrentResponse {
    pub torrents: Vec<Torrent>,
}

/// Subset of torrent state the pipeline cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Torrent {
    pub id: i64,
    pub name: String,
    #[serde(rename = "percentDone")]
    pub percent_done: f64,
    pub status: TorrentStatus,
    #[serde(rename = "torrentFile", default)]
    pub torrent_file: Option<String>,
}

/// Transmission torrent status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "i64")]
pub enum TorrentStatus {
    Stopped,
    QueuedToCheck,
    Checking,
    QueuedToDownload,
    Downloading,
    QueuedToSeed,
    Seeding,
    Unknown,
}

impl From<i64> for TorrentStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => TorrentStatus::Stopped,
            1 => TorrentStatus::QueuedToCheck,
            2 => TorrentStatus::Checking,
            3 => TorrentStatus::QueuedToDownload,
            4 => TorrentStatus::Downloading,
            5 => TorrentStatus::QueuedToSeed,
            6 => TorrentStatus::Seeding,
            _ => TorrentStatus::Unknown,
        }
    }
}

impl TorrentStatus {
    /// Whether the daemon is still actively working on the torrent.
    pub fn is_running(&self) -> bool {
        !matches!(self, TorrentStatus::Stopped | TorrentStatus::Unknown)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RemoveTorrentArgs {
    pub ids: Vec<i64>,
    #[serde(rename = "delete-local-data")]
    pub delete_local_data: bool,
}
