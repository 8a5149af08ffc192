mod client;
mod error;
pub mod models;

pub use client::TransmissionClient;
pub use error::TransmissionError;
pub use models::{Torrent, TorrentAdded, TorrentStatus};

pub type Result<T> = std::result::Result<T, TransmissionError>;
