use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

/// Per-request timeout for page fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of fetching one page of a feed source.
#[derive(Debug, Clone)]
pub enum PageResponse {
    /// 2xx with a body to extract from
    Page(String),
    /// The page-end sentinel: the source signals "no more pages", distinct
    /// from a page with no content
    End,
    /// Any other status; retryable
    Other(u16),
}

#[derive(Debug, Clone, Error)]
#[error("Transport error fetching {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

/// Blocking page fetcher, driven from inside the bridge worker.
pub trait PageFetch: Send + Sync {
    fn fetch(&self, url: &str, page: u32) -> Result<PageResponse, FetchError>;
}

/// reqwest-blocking [`PageFetch`] against real sources.
///
/// Upstream signals the end of pagination with HTTP 500. The client is built
/// on first use so construction always happens on the worker thread, where
/// blocking is allowed.
pub struct HttpPageFetcher {
    client: Mutex<Option<reqwest::blocking::Client>>,
}

impl HttpPageFetcher {
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<reqwest::blocking::Client, reqwest::Error> {
        let mut guard = self.client.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        *guard = Some(client.clone());
        Ok(client)
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the page number to a source url.
pub fn page_url(url: &str, page: u32) -> String {
    if url.contains('?') {
        format!("{url}&page={page}")
    } else {
        format!("{url}?page={page}")
    }
}

impl PageFetch for HttpPageFetcher {
    fn fetch(&self, url: &str, page: u32) -> Result<PageResponse, FetchError> {
        let request_url = page_url(url, page);
        let transport = |e: reqwest::Error| FetchError {
            url: request_url.clone(),
            message: e.to_string(),
        };

        let response = self.client().map_err(transport)?.get(&request_url).send().map_err(transport)?;
        let status = response.status();

        if status.as_u16() == 500 {
            return Ok(PageResponse::End);
        }
        if status.is_success() {
            let body = response.text().map_err(transport)?;
            return Ok(PageResponse::Page(body));
        }
        Ok(PageResponse::Other(status.as_u16()))
    }
}
