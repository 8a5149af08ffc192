use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use extract::{ExtractTemplate, FeedItem};

use crate::fetch::{FetchError, PageFetch, PageResponse};
use crate::models::Subscription;

/// Give up on a page after this many non-success statuses.
pub const RETRY_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] extract::ExtractError),
}

/// Paginated crawl over one subscription's source.
///
/// An explicit pull-based iterator: state is the current page, the retry
/// counter and a buffer of filtered items from the last fetched page. Finite
/// and not restartable. Runs blocking I/O, so it is meant to be driven
/// through the bridge.
pub struct Crawl {
    fetcher: Arc<dyn PageFetch>,
    template: ExtractTemplate,
    subscription: Subscription,
    auto_page: bool,
    page: u32,
    retry: u32,
    buffer: VecDeque<FeedItem>,
    done: bool,
}

impl Crawl {
    pub fn new(
        fetcher: Arc<dyn PageFetch>,
        template: ExtractTemplate,
        subscription: Subscription,
        auto_page: bool,
    ) -> Self {
        Self {
            fetcher,
            template,
            subscription,
            auto_page,
            page: 1,
            retry: 0,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Fetch pages until the buffer has content or the crawl is over.
    /// `Ok(false)` means clean termination.
    fn fill_buffer(&mut self) -> Result<bool, CrawlError> {
        loop {
            match self.fetcher.fetch(&self.subscription.url, self.page)? {
                PageResponse::End => return Ok(false),
                PageResponse::Page(body) => {
                    self.retry = 0;
                    let raw = self.template.extract(&body)?;
                    // The stop check uses the raw extracted count: a page
                    // whose items all fall to the word filters is not the end
                    // of the feed.
                    if raw.is_empty() {
                        return Ok(false);
                    }
                    for item in raw {
                        if title_matches(&self.subscription, &item.title) {
                            self.buffer.push_back(item);
                        } else {
                            tracing::debug!(
                                "Filtered out by word filters: {}",
                                item.title
                            );
                        }
                    }
                    if !self.auto_page {
                        self.done = true;
                        return Ok(true);
                    }
                    self.page += 1;
                    if !self.buffer.is_empty() {
                        return Ok(true);
                    }
                    // Fully-filtered page: keep paginating.
                }
                PageResponse::Other(status) => {
                    self.retry += 1;
                    tracing::warn!(
                        "Fetch of {} page {} returned {}, retry {}/{}",
                        self.subscription.url,
                        self.page,
                        status,
                        self.retry,
                        RETRY_LIMIT
                    );
                    if self.retry >= RETRY_LIMIT {
                        return Ok(false);
                    }
                }
            }
        }
    }
}

impl Iterator for Crawl {
    type Item = Result<FeedItem, CrawlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.buffer.pop_front() {
            return Some(Ok(item));
        }
        if self.done {
            return None;
        }
        match self.fill_buffer() {
            Ok(true) => self.buffer.pop_front().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Word filters over an item title: every include word must appear, no
/// exclude word may.
pub(crate) fn title_matches(sub: &Subscription, title: &str) -> bool {
    sub.include_words().all(|word| title.contains(word))
        && !sub.exclude_words().any(|word| title.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_body, ScriptedFetcher};

    fn collect(crawl: Crawl) -> (Vec<FeedItem>, Option<CrawlError>) {
        let mut items = Vec::new();
        for next in crawl {
            match next {
                Ok(item) => items.push(item),
                Err(e) => return (items, Some(e)),
            }
        }
        (items, None)
    }

    fn crawl_with(fetcher: Arc<ScriptedFetcher>, sub: Subscription, auto_page: bool) -> Crawl {
        Crawl::new(fetcher, ExtractTemplate::default(), sub, auto_page)
    }

    #[test]
    fn test_stops_on_end_sentinel() {
        let fetcher = Arc::new(ScriptedFetcher::of(vec![
            PageResponse::Page(page_body(&["a", "b"])),
            PageResponse::End,
        ]));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, true));
        assert!(error.is_none());
        assert_eq!(items.len(), 2);
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_stops_on_raw_empty_page() {
        let fetcher = Arc::new(ScriptedFetcher::of(vec![
            PageResponse::Page(page_body(&["a"])),
            PageResponse::Page(page_body(&[])),
            PageResponse::Page(page_body(&["never fetched"])),
        ]));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, true));
        assert!(error.is_none());
        assert_eq!(items.len(), 1);
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_fully_filtered_page_does_not_stop_pagination() {
        let mut sub = Subscription::new("s", "http://x/rss");
        sub.exclude_words = "720p".into();
        let fetcher = Arc::new(ScriptedFetcher::of(vec![
            PageResponse::Page(page_body(&["ep3 720p", "ep3v2 720p"])),
            PageResponse::Page(page_body(&["ep2 1080p"])),
            PageResponse::End,
        ]));

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, true));
        assert!(error.is_none());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "ep2 1080p");
        assert_eq!(fetcher.calls(), 3);
    }

    #[test]
    fn test_persistent_failure_stops_after_retry_limit() {
        let fetcher = Arc::new(ScriptedFetcher::always(PageResponse::Other(403)));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, true));
        assert!(error.is_none());
        assert!(items.is_empty());
        assert_eq!(fetcher.calls(), RETRY_LIMIT as usize);
    }

    #[test]
    fn test_retry_counter_resets_on_success() {
        let mut script = vec![
            PageResponse::Other(502),
            PageResponse::Other(502),
            PageResponse::Page(page_body(&["a"])),
        ];
        // After the successful page, the full retry budget is available again.
        script.extend(std::iter::repeat_with(|| PageResponse::Other(502)).take(20));
        let fetcher = Arc::new(ScriptedFetcher::of(script));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, true));
        assert!(error.is_none());
        assert_eq!(items.len(), 1);
        assert_eq!(fetcher.calls(), 3 + RETRY_LIMIT as usize);
    }

    #[test]
    fn test_auto_page_off_fetches_a_single_page() {
        let fetcher = Arc::new(ScriptedFetcher::of(vec![
            PageResponse::Page(page_body(&["a", "b"])),
            PageResponse::Page(page_body(&["c"])),
        ]));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(Arc::clone(&fetcher), sub, false));
        assert!(error.is_none());
        assert_eq!(items.len(), 2);
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_transport_error_is_terminal() {
        let fetcher = Arc::new(ScriptedFetcher::of_steps(vec![
            Ok(PageResponse::Page(page_body(&["a"]))),
            Err(FetchError {
                url: "http://x/rss?page=2".into(),
                message: "connection reset".into(),
            }),
        ]));
        let sub = Subscription::new("s", "http://x/rss");

        let (items, error) = collect(crawl_with(fetcher, sub, true));
        assert_eq!(items.len(), 1);
        assert!(matches!(error, Some(CrawlError::Fetch(_))));
    }

    #[test]
    fn test_title_filter_exactness() {
        let mut sub = Subscription::new("s", "http://x/rss");
        sub.include_words = "1080p CHS".into();
        sub.exclude_words = "720p HEVC".into();

        assert!(title_matches(&sub, "[group] ep3 CHS 1080p"));
        // one include word missing
        assert!(!title_matches(&sub, "[group] ep3 1080p"));
        // one exclude word present
        assert!(!title_matches(&sub, "[group] ep3 CHS 1080p HEVC"));
    }
}
