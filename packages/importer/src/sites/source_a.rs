//! Source A: card-style results with a definition list per card.

use async_trait::async_trait;
use std::time::Duration;

use super::fields::{apply_rows, FieldLabels};
use super::html::ItemHtml;
use crate::error::Result;
use crate::traits::site::{SiteAdapter, SiteConfig};
use crate::types::job::ServiceType;
use crate::types::listing::{ExternalListing, RawItem};

const LABELS: FieldLabels = FieldLabels {
    industry: &["業種"],
    occupation: &["職種"],
    employment_status: &["雇用形態"],
    work_location: &["勤務地"],
    working_hours: &["勤務時間"],
    holiday: &["休日・休暇", "休日"],
    salary: &["年収", "想定年収"],
    age: &["年齢"],
    gender: &["性別"],
    final_education: &["最終学歴", "学歴"],
    required_experience: &["必須経験", "応募資格"],
    work_detail: &["仕事内容"],
    commission: &["紹介手数料"],
    refund_policy: &["返金規定"],
};

pub struct SourceA {
    config: SiteConfig,
}

impl SourceA {
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: SiteConfig) -> Self {
        Self { config }
    }

    pub fn default_config() -> SiteConfig {
        SiteConfig {
            service: ServiceType::SourceA,
            login_url: "https://agent.source-a.example/login".into(),
            email_selector: "input[name='email']".into(),
            password_selector: "input[name='password']".into(),
            submit_selector: "button[type='submit']".into(),
            submit_label: "ログイン".into(),
            login_url_marker: "login".into(),
            listing_container_selector: ".search-results".into(),
            item_selector: ".search-results .job-card".into(),
            page_param: "page".into(),
            page_size: 25,
            page_ceiling: 40,
            navigation_delay: Duration::from_secs(5),
            dedup_on_source_enterprise_id: false,
        }
    }
}

impl Default for SourceA {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for SourceA {
    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn extract(&self, item: &RawItem) -> Result<ExternalListing> {
        let html = ItemHtml::parse(
            &item.html,
            format!("{} item {}", item.page_url, item.sequence),
        );

        let title = html.required("title", ".job-card__title")?;
        let company_name = html.required("company_name", ".job-card__company")?;

        let mut listing = ExternalListing::new(title, company_name);
        listing.external_source_id = html.attr(".job-card", "data-job-id")?;

        let rows = html.labeled_rows(".job-card__spec .row", "dt", "dd")?;
        apply_rows(&mut listing, &rows, &LABELS);

        let url = html
            .attr("a.job-card__link", "href")?
            .unwrap_or_else(|| item.page_url.clone());
        listing.record_provenance(self.service(), item.scraped_at, &url);

        Ok(listing)
    }
}
