//! Testing utilities including mock implementations.
//!
//! These let the pipeline run end to end without a browser, a mail API or
//! a database.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use scraper::Html;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::RunConfig;
use crate::error::{ImportError, Result};
use crate::security::{CredentialVault, SecretString};
use crate::sites::html::{selector, ItemHtml};
use crate::traits::browser::{BrowserLauncher, BrowserPage};
use crate::traits::mailer::{OperatorMailer, OperatorMessage};
use crate::traits::site::{SiteAdapter, SiteConfig};
use crate::types::codes::{map_phrases, Industry};
use crate::types::ids::{AgencyId, ImportJobId, StaffId};
use crate::types::job::{ImportJob, NewImportJob, ServiceType};
use crate::types::listing::{ExternalListing, RawItem};

/// Label of the mock login button.
pub const MOCK_LOGIN_LABEL: &str = "Log in";

const EMPTY_PAGE: &str = "<html><body></body></html>";

/// Site config pointing at `https://<service>.test`, with no navigation delay.
pub fn test_site_config(service: ServiceType) -> SiteConfig {
    let host = test_host(service);
    SiteConfig {
        service,
        login_url: format!("{}/login", host),
        email_selector: "#email".into(),
        password_selector: "#password".into(),
        submit_selector: "button.login".into(),
        submit_label: MOCK_LOGIN_LABEL.into(),
        login_url_marker: "login".into(),
        listing_container_selector: ".results".into(),
        item_selector: ".results .listing".into(),
        page_param: "page".into(),
        page_size: 4,
        page_ceiling: 20,
        navigation_delay: Duration::ZERO,
        dedup_on_source_enterprise_id: service == ServiceType::SourceB,
    }
}

fn test_host(service: ServiceType) -> String {
    format!("https://{}.test", service.to_string().replace('_', "-"))
}

/// Search URL used by `sample_job`.
pub fn test_search_url(service: ServiceType) -> String {
    format!("{}/search?q=sales", test_host(service))
}

/// A result page with one listing per company name.
pub fn listing_page_html<S: AsRef<str>>(companies: &[S]) -> String {
    let ids: Vec<(&str, u64)> = companies.iter().map(|c| (c.as_ref(), 0)).collect();
    listing_page_html_with_ids(&ids)
}

/// A result page whose listings carry a source enterprise id.
pub fn listing_page_html_with_ids(companies: &[(&str, u64)]) -> String {
    let items: String = companies
        .iter()
        .enumerate()
        .map(|(i, (company, enterprise_id))| {
            format!(
                r#"<div class="listing" data-enterprise-id="{}">
                     <h2 class="title">Job {}</h2>
                     <p class="company">{}</p>
                     <p class="industry">IT・通信</p>
                   </div>"#,
                enterprise_id,
                i + 1,
                company
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="results">{}</div></body></html>"#,
        items
    )
}

/// Vault with a fixed key.
pub fn test_vault() -> CredentialVault {
    CredentialVault::new(&[7u8; 32]).expect("32-byte key")
}

/// A pending job on 2026-03-01 10:00 in the schedule timezone.
pub fn sample_job(service: ServiceType) -> ImportJob {
    ImportJob {
        id: ImportJobId::new(),
        staff_id: StaffId::new(),
        agency_id: AgencyId::new(),
        service_type: service,
        login_id: "staff@example.com".into(),
        encrypted_password: String::new(),
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
        start_hour: 10,
        max_count: 10,
        offset: 0,
        search_url: test_search_url(service),
        succeeded: false,
        claimed_by: None,
        claimed_until: None,
        created_at: Utc::now(),
    }
}

/// Scheduling input for 2026-03-01 at `hour`, password `hunter2`.
pub fn new_job_input(service: ServiceType, hour: u8) -> NewImportJob {
    NewImportJob {
        staff_id: StaffId::new(),
        agency_id: AgencyId::new(),
        service_type: service,
        login_id: "staff@example.com".into(),
        password: SecretString::new("hunter2"),
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
        start_hour: hour,
        max_count: 10,
        offset: 0,
        search_url: test_search_url(service),
    }
}

struct BrowserState {
    current_url: String,
    current_html: String,
    login_outcomes: VecDeque<bool>,
    login_submissions: usize,
    fills: HashMap<String, String>,
    navigations: Vec<String>,
}

/// A scripted browser.
///
/// Pages are served by exact URL; unknown URLs render an empty page.
/// Submitting the login form pops the next scripted outcome (success when
/// none are left) and lands on a dashboard on success.
pub struct MockBrowser {
    pages: HashMap<String, String>,
    button_label: String,
    navigation_latency: Duration,
    state: Mutex<BrowserState>,
    sessions_closed: AtomicUsize,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            button_label: MOCK_LOGIN_LABEL.to_string(),
            navigation_latency: Duration::ZERO,
            state: Mutex::new(BrowserState {
                current_url: "about:blank".into(),
                current_html: EMPTY_PAGE.into(),
                login_outcomes: VecDeque::new(),
                login_submissions: 0,
                fills: HashMap::new(),
                navigations: Vec::new(),
            }),
            sessions_closed: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Label of the login button, `MOCK_LOGIN_LABEL` by default.
    pub fn with_button_label(mut self, label: impl Into<String>) -> Self {
        self.button_label = label.into();
        self
    }

    pub fn with_login_outcomes(self, outcomes: Vec<bool>) -> Self {
        self.state.lock().unwrap().login_outcomes = outcomes.into();
        self
    }

    /// Sleep this long on every navigation.
    pub fn with_navigation_latency(mut self, latency: Duration) -> Self {
        self.navigation_latency = latency;
        self
    }

    pub fn login_submissions(&self) -> usize {
        self.state.lock().unwrap().login_submissions
    }

    pub fn filled(&self, selector: &str) -> Option<String> {
        self.state.lock().unwrap().fills.get(selector).cloned()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    /// Navigations to anything but the login page.
    pub fn result_page_visits(&self) -> usize {
        self.navigations()
            .iter()
            .filter(|url| !url.contains("login"))
            .count()
    }

    /// Sessions handed out by `MockLauncher` that have been dropped.
    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    fn with_document<T>(&self, css: &str, f: impl FnOnce(&Html, &scraper::Selector) -> T) -> Result<T> {
        let sel = selector(css)?;
        let html = self.state.lock().unwrap().current_html.clone();
        let doc = Html::parse_document(&html);
        Ok(f(&doc, &sel))
    }
}

#[async_trait]
impl BrowserPage for MockBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        if !self.navigation_latency.is_zero() {
            tokio::time::sleep(self.navigation_latency).await;
        }
        let html = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| EMPTY_PAGE.to_string());
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.current_url = url.to_string();
        state.current_html = html;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .fills
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click_labeled(&self, selector: &str, label: &str) -> Result<()> {
        if label != self.button_label {
            return Err(ImportError::Browser(format!(
                "no {} labeled {:?}",
                selector, label
            )));
        }
        let mut state = self.state.lock().unwrap();
        state.login_submissions += 1;
        if state.login_outcomes.pop_front().unwrap_or(true) {
            state.current_url = "https://mock.test/dashboard".into();
            state.current_html = EMPTY_PAGE.into();
        }
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<()> {
        Ok(())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.with_document(selector, |doc, sel| doc.select(sel).next().is_some())
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.with_document(selector, |doc, sel| doc.select(sel).count())
    }

    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<()> {
        let count = self.count(selector).await?;
        if index >= count {
            return Err(ImportError::Browser(format!(
                "no element {} of {}",
                index, selector
            )));
        }
        Ok(())
    }

    async fn outer_html(&self, selector: &str, index: usize) -> Result<String> {
        self.with_document(selector, |doc, sel| doc.select(sel).nth(index).map(|el| el.html()))?
            .ok_or_else(|| ImportError::Browser(format!("no element {} of {}", index, selector)))
    }
}

/// Session handed out by `MockLauncher`; counts its own teardown.
struct MockSession {
    browser: Arc<MockBrowser>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.browser.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrowserPage for MockSession {
    async fn goto(&self, url: &str) -> Result<()> {
        self.browser.goto(url).await
    }

    async fn current_url(&self) -> Result<String> {
        self.browser.current_url().await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.browser.fill(selector, value).await
    }

    async fn click_labeled(&self, selector: &str, label: &str) -> Result<()> {
        self.browser.click_labeled(selector, label).await
    }

    async fn wait_for_navigation(&self) -> Result<()> {
        self.browser.wait_for_navigation().await
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.browser.exists(selector).await
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.browser.count(selector).await
    }

    async fn scroll_into_view(&self, selector: &str, index: usize) -> Result<()> {
        self.browser.scroll_into_view(selector, index).await
    }

    async fn outer_html(&self, selector: &str, index: usize) -> Result<String> {
        self.browser.outer_html(selector, index).await
    }
}

/// Hands out sessions over one shared `MockBrowser`.
pub struct MockLauncher {
    browser: Arc<MockBrowser>,
    missing_binary: bool,
    launches: AtomicUsize,
}

impl MockLauncher {
    pub fn new(browser: Arc<MockBrowser>) -> Self {
        Self {
            browser,
            missing_binary: false,
            launches: AtomicUsize::new(0),
        }
    }

    /// Fail every launch as if no browser were installed.
    pub fn missing_binary(mut self) -> Self {
        self.missing_binary = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, _run: &RunConfig) -> Result<Box<dyn BrowserPage>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.missing_binary {
            return Err(ImportError::Environment("no browser binary on PATH".into()));
        }
        Ok(Box::new(MockSession {
            browser: Arc::clone(&self.browser),
        }))
    }
}

/// Records operator mail.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OperatorMessage>>,
    attempts: AtomicUsize,
    failing: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn sent(&self) -> Vec<OperatorMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorMailer for MockMailer {
    async fn send(&self, message: &OperatorMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ImportError::Environment("mock mail API is down".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Site adapter for the markup produced by `listing_page_html`.
pub struct MockSite {
    config: SiteConfig,
    panic_on_item: Option<usize>,
}

impl MockSite {
    pub fn new(service: ServiceType) -> Self {
        Self {
            config: test_site_config(service),
            panic_on_item: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn with_dedup_on_source_enterprise_id(mut self, enabled: bool) -> Self {
        self.config.dedup_on_source_enterprise_id = enabled;
        self
    }

    /// Panic while extracting the item with this crawl sequence number.
    pub fn with_panic_on_item(mut self, sequence: usize) -> Self {
        self.panic_on_item = Some(sequence);
        self
    }
}

#[async_trait]
impl SiteAdapter for MockSite {
    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn extract(&self, item: &RawItem) -> Result<ExternalListing> {
        if self.panic_on_item == Some(item.sequence) {
            panic!("mock extractor failed on item {}", item.sequence);
        }

        let html = ItemHtml::parse(&item.html, format!("item {}", item.sequence));
        let mut listing = ExternalListing::new(
            html.required("title", ".title")?,
            html.required("company_name", ".company")?,
        );
        listing.source_enterprise_id = html
            .attr(".listing", "data-enterprise-id")?
            .and_then(|id| id.parse().ok());
        if let Some(industry) = html.text(".industry")? {
            listing.industries = map_phrases(&industry, Industry::from_label);
        }
        listing.record_provenance(self.service(), item.scraped_at, &item.page_url);
        Ok(listing)
    }
}
