//! Shared test doubles for the pipeline seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use downloader::{AddDownloadOptions, Downloader, DownloadHandle, DownloadStatus};
use webhook::{WebhookError, WebhookPost};

use crate::fetch::{FetchError, PageFetch, PageResponse};

/// An RSS page body with one enclosure item per title. The torrent url is
/// derived from the title so tests can predict it.
pub(crate) fn page_body(titles: &[&str]) -> String {
    let mut body = String::from("<rss><channel>");
    for title in titles {
        body.push_str(&format!(
            "<item><title>{title}</title><link>http://example.com/{slug}</link>\
             <enclosure url=\"http://example.com/{slug}.torrent\"/></item>",
            slug = title.replace(' ', "-"),
        ));
    }
    body.push_str("</channel></rss>");
    body
}

pub(crate) fn torrent_url_for(title: &str) -> String {
    format!("http://example.com/{}.torrent", title.replace(' ', "-"))
}

/// Scripted [`PageFetch`]: pops one step per call, regardless of url; counts
/// calls. An exhausted script answers the end sentinel.
pub(crate) struct ScriptedFetcher {
    steps: Mutex<VecDeque<Result<PageResponse, FetchError>>>,
    repeat: Option<PageResponse>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn of(pages: Vec<PageResponse>) -> Self {
        Self::of_steps(pages.into_iter().map(Ok).collect())
    }

    pub fn of_steps(steps: Vec<Result<PageResponse, FetchError>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(page: PageResponse) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat: Some(page),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageFetch for ScriptedFetcher {
    fn fetch(&self, _url: &str, _page: u32) -> Result<PageResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.steps.lock().unwrap().pop_front() {
            return step;
        }
        Ok(self.repeat.clone().unwrap_or(PageResponse::End))
    }
}

/// Routes fetches by source url so multi-subscription tests can script each
/// source independently.
pub(crate) struct RoutedFetcher {
    routes: Mutex<std::collections::HashMap<String, VecDeque<Result<PageResponse, FetchError>>>>,
}

impl RoutedFetcher {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn script(&self, url: &str, steps: Vec<Result<PageResponse, FetchError>>) {
        self.routes.lock().unwrap().insert(url.to_string(), steps.into());
    }
}

impl PageFetch for RoutedFetcher {
    fn fetch(&self, url: &str, _page: u32) -> Result<PageResponse, FetchError> {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url).and_then(VecDeque::pop_front) {
            Some(step) => step,
            None => Ok(PageResponse::End),
        }
    }
}

/// Recording [`Downloader`]; optionally fails every call.
pub(crate) struct MockDownloader {
    pub added: Mutex<Vec<AddDownloadOptions>>,
    fail: bool,
    next_id: AtomicUsize,
}

impl MockDownloader {
    pub fn new() -> Self {
        Self {
            added: Mutex::new(Vec::new()),
            fail: false,
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn added_urls(&self) -> Vec<String> {
        self.added.lock().unwrap().iter().map(|o| o.url.clone()).collect()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn add_download(&self, options: AddDownloadOptions) -> downloader::Result<DownloadHandle> {
        if self.fail {
            return Err(downloader::DownloaderError::NotConfigured);
        }
        self.added.lock().unwrap().push(options);
        Ok(DownloadHandle(self.next_id.fetch_add(1, Ordering::SeqCst) as i64))
    }

    async fn get_status(&self, _handle: DownloadHandle) -> downloader::Result<DownloadStatus> {
        Ok(DownloadStatus {
            progress: 1.0,
            running: false,
        })
    }

    async fn remove(&self, _handle: DownloadHandle, _delete_files: bool) -> downloader::Result<()> {
        Ok(())
    }

    fn downloader_type(&self) -> &'static str {
        "mock"
    }
}

/// Recording [`WebhookPost`]; urls listed as failing are rejected.
pub(crate) struct MockWebhookPost {
    pub posts: Mutex<Vec<(String, String)>>,
    fail_urls: Vec<String>,
}

impl MockWebhookPost {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail_urls: Vec::new(),
        }
    }

    pub fn failing_for(urls: &[&str]) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail_urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn posted_urls(&self) -> Vec<String> {
        self.posts.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }
}

#[async_trait]
impl WebhookPost for MockWebhookPost {
    async fn post(&self, url: &str, body: String) -> webhook::Result<()> {
        if self.fail_urls.iter().any(|u| u == url) {
            return Err(WebhookError::Rejected {
                url: url.to_string(),
                status: 500,
                body: "mock failure".into(),
            });
        }
        self.posts.lock().unwrap().push((url.to_string(), body));
        Ok(())
    }
}
