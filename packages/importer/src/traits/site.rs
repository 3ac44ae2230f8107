//! Site adapter: the boundary isolating one external source's login,
//! pagination and selector contract.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::browser::session;
use crate::error::{ImportError, Result};
use crate::security::LoginCredentials;
use crate::traits::browser::BrowserPage;
use crate::types::job::ServiceType;
use crate::types::listing::{ExternalListing, RawItem};

/// Per-source constants. A site redesign is a data change here.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub service: ServiceType,

    // Login form
    pub login_url: String,
    pub email_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    /// Exact visible label of the submit button
    pub submit_label: String,
    /// Substring of the URL that means "still on the login page"
    pub login_url_marker: String,

    // Result pages
    pub listing_container_selector: String,
    pub item_selector: String,
    pub page_param: String,
    pub page_size: usize,
    /// Hard upper bound on page numbers
    pub page_ceiling: usize,
    /// Minimum spacing between navigations
    pub navigation_delay: Duration,

    /// Intra-batch dedup also compares the source's enterprise id
    pub dedup_on_source_enterprise_id: bool,
}

impl SiteConfig {
    /// 1-based page that contains `offset`.
    pub fn start_page(&self, offset: usize) -> usize {
        offset / self.page_size.max(1) + 1
    }
}

/// One external recruiting platform.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn config(&self) -> &SiteConfig;

    fn service(&self) -> ServiceType {
        self.config().service
    }

    /// Log in; retried once, then `ImportError::Authentication`.
    async fn login(&self, page: &dyn BrowserPage, credentials: &LoginCredentials) -> Result<()> {
        session::login(page, self.config(), credentials).await
    }

    /// Search URL with the page parameter set.
    fn page_url(&self, search_url: &str, page_number: usize) -> Result<String> {
        let mut url = Url::parse(search_url)
            .map_err(|e| ImportError::Config(format!("invalid search URL {}: {}", search_url, e)))?;
        let param = &self.config().page_param;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(param, &page_number.to_string());
        Ok(url.into())
    }

    /// Open a result page. `None` when the page shows no results.
    async fn list_page(
        &self,
        page: &dyn BrowserPage,
        search_url: &str,
        page_number: usize,
    ) -> Result<Option<usize>> {
        let config = self.config();
        page.goto(&self.page_url(search_url, page_number)?).await?;

        if !page.exists(&config.listing_container_selector).await? {
            return Ok(None);
        }
        let count = page.count(&config.item_selector).await?;
        Ok((count > 0).then_some(count))
    }

    /// Scroll an item into view, then read it. Some sites render details
    /// only once the element is visible.
    async fn read_item(&self, page: &dyn BrowserPage, index: usize) -> Result<String> {
        let selector = &self.config().item_selector;
        page.scroll_into_view(selector, index).await?;
        page.outer_html(selector, index).await
    }

    /// Map one raw item to a listing. Missing identity fields are errors.
    fn extract(&self, item: &RawItem) -> Result<ExternalListing>;
}
