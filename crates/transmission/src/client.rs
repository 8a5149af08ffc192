use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::{
    AddTorrentArgs, AddTorrentResponse, GetTorrentArgs, GetTorrentResponse, RemoveTorrentArgs,
    RpcRequest, RpcResponse, Torrent, TorrentAdded,
};
use crate::{Result, TransmissionError};

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Transmission RPC client.
///
/// The daemon rotates a session id and answers 409 until the caller echoes it
/// back; the id is cached and the request replayed once on conflict.
pub struct TransmissionClient {
    client: Client,
    rpc_url: String,
    auth: Option<(String, String)>,
    session_id: RwLock<Option<String>>,
}

impl TransmissionClient {
    pub fn new(
        client: Client,
        rpc_url: impl Into<String>,
        auth: Option<(String, String)>,
    ) -> Self {
        Self {
            client,
            rpc_url: rpc_url.into(),
            auth,
            session_id: RwLock::new(None),
        }
    }

    /// `torrent-add`: hand a torrent url to the daemon.
    ///
    /// A duplicate of a known torrent is reported as a success carrying the
    /// existing torrent's identity.
    pub async fn torrent_add(
        &self,
        torrent_url: &str,
        download_dir: Option<&str>,
    ) -> Result<TorrentAdded> {
        let response: AddTorrentResponse = self
            .call(
                "torrent-add",
                AddTorrentArgs {
                    filename: torrent_url,
                    download_dir,
                },
            )
            .await?;

        response
            .torrent_added
            .or(response.torrent_duplicate)
            .ok_or_else(|| TransmissionError::Rpc("torrent-add returned no torrent".into()))
    }

    /// `torrent-get` for a single id.
    pub async fn torrent_get(&self, id: i64) -> Result<Option<Torrent>> {
        let response: GetTorrentResponse = self
            .call(
                "torrent-get",
                GetTorrentArgs {
                    ids: vec![id],
                    fields: vec!["id", "name", "percentDone", "status", "torrentFile"],
                },
            )
            .await?;
        Ok(response.torrents.into_iter().next())
    }

    /// `torrent-remove`, optionally deleting downloaded data.
    pub async fn torrent_remove(&self, id: i64, delete_local_data: bool) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "torrent-remove",
                RemoveTorrentArgs {
                    ids: vec![id],
                    delete_local_data,
                },
            )
            .await?;
        Ok(())
    }

    async fn call<A: Serialize, T: DeserializeOwned>(
        &self,
        method: &'static str,
        arguments: A,
    ) -> Result<T> {
        let request = RpcRequest { method, arguments };

        let mut response = self.send(&request).await?;
        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(id) = session_id {
                tracing::debug!("Refreshed transmission session id");
                *self.session_id.write().await = Some(id);
            }
            response = self.send(&request).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TransmissionError::UnexpectedResponse {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let envelope: RpcResponse<T> = response.json().await?;
        if envelope.result != "success" {
            return Err(TransmissionError::Rpc(envelope.result));
        }
        envelope
            .arguments
            .ok_or_else(|| TransmissionError::Rpc(format!("{method} returned no arguments")))
    }

    async fn send<A: Serialize>(
        &self,
        request: &RpcRequest<A>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&self.rpc_url).json(request);
        if let Some((user, password)) = &self.auth {
            builder = builder.basic_auth(user, Some(password));
        }
        if let Some(id) = self.session_id.read().await.as_ref() {
            builder = builder.header(SESSION_HEADER, id);
        }
        Ok(builder.send().await?)
    }
}
