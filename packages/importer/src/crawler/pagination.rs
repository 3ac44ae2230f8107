//! Lazy crawl over a source's result pages.

use async_stream::try_stream;
use chrono::Utc;
use futures::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::throttle::NavigationThrottle;
use crate::error::{ImportError, Result};
use crate::traits::browser::BrowserPage;
use crate::traits::site::SiteAdapter;
use crate::types::listing::RawItem;

/// Bounds for one crawl.
#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    /// Items already imported by earlier runs; picks the start page
    pub offset: usize,
    /// Stop once more than this many items have been seen
    pub max_count: usize,
    /// Non-production cap on yielded items
    pub item_cap: Option<usize>,
}

/// Walks result pages from the page containing `offset`.
///
/// Stops at the first page without results, at the site's page ceiling,
/// when the scraped count exceeds `max_count`, or when the item cap is hit.
pub struct Crawler<'a> {
    site: &'a dyn SiteAdapter,
    page: &'a dyn BrowserPage,
    throttle: NavigationThrottle,
    cancel: CancellationToken,
    timeout_secs: u64,
}

impl<'a> Crawler<'a> {
    pub fn new(site: &'a dyn SiteAdapter, page: &'a dyn BrowserPage) -> Self {
        Self {
            throttle: NavigationThrottle::new(site.config().navigation_delay),
            site,
            page,
            cancel: CancellationToken::new(),
            timeout_secs: 0,
        }
    }

    /// Abort between navigations once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken, timeout_secs: u64) -> Self {
        self.cancel = cancel;
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn crawl(
        self,
        search_url: &'a str,
        limits: CrawlLimits,
    ) -> impl Stream<Item = Result<RawItem>> + Send + 'a {
        try_stream! {
            let config = self.site.config();
            let start_page = config.start_page(limits.offset);
            let mut scraped = 0usize;
            let mut yielded = 0usize;

            info!(
                service = %config.service,
                start_page,
                max_count = limits.max_count,
                item_cap = ?limits.item_cap,
                "Starting crawl"
            );

            'pages: for page_number in start_page..=config.page_ceiling {
                if self.cancel.is_cancelled() {
                    Err(ImportError::Timeout { seconds: self.timeout_secs })?;
                }

                self.throttle.wait().await;
                let page_url = self.site.page_url(search_url, page_number)?;
                let count = match self.site.list_page(self.page, search_url, page_number).await? {
                    Some(count) => count,
                    None => {
                        info!(page_number, "No results, crawl finished");
                        break 'pages;
                    }
                };
                debug!(page_number, count, "Result page loaded");

                for index in 0..count {
                    if limits.item_cap.is_some_and(|cap| yielded >= cap) {
                        info!(yielded, "Reached debug item cap");
                        break 'pages;
                    }
                    scraped += 1;
                    if scraped > limits.max_count {
                        info!(scraped = scraped - 1, "Reached max count");
                        break 'pages;
                    }
                    if self.cancel.is_cancelled() {
                        Err(ImportError::Timeout { seconds: self.timeout_secs })?;
                    }

                    let html = self.site.read_item(self.page, index).await?;
                    yield RawItem {
                        html,
                        page_url: page_url.clone(),
                        page_number,
                        sequence: scraped,
                        scraped_at: Utc::now(),
                    };
                    yielded += 1;
                }
            }
        }
    }
}
