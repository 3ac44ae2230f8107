//! Source B: table-style offers that expose the source's enterprise id.
//!
//! Several companies on this source share display names, so intra-batch
//! dedup also compares the enterprise id.

use async_trait::async_trait;
use std::time::Duration;

use super::fields::{apply_rows, FieldLabels};
use super::html::ItemHtml;
use crate::error::Result;
use crate::traits::site::{SiteAdapter, SiteConfig};
use crate::types::job::ServiceType;
use crate::types::listing::{ExternalListing, RawItem};

const LABELS: FieldLabels = FieldLabels {
    industry: &["業界", "業種"],
    occupation: &["職種"],
    employment_status: &["雇用区分", "雇用形態"],
    work_location: &["勤務地"],
    working_hours: &["就業時間", "勤務時間"],
    holiday: &["休日休暇"],
    salary: &["給与", "年収"],
    age: &["年齢制限", "年齢"],
    gender: &["性別"],
    final_education: &["学歴"],
    required_experience: &["必要な経験", "必須要件"],
    work_detail: &["業務内容", "仕事内容"],
    commission: &["成功報酬"],
    refund_policy: &["返金規定", "返還規定"],
};

pub struct SourceB {
    config: SiteConfig,
}

impl SourceB {
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: SiteConfig) -> Self {
        Self { config }
    }

    pub fn default_config() -> SiteConfig {
        SiteConfig {
            service: ServiceType::SourceB,
            login_url: "https://partner.source-b.example/users/login".into(),
            email_selector: "#login_id".into(),
            password_selector: "#login_password".into(),
            submit_selector: "form#login button".into(),
            submit_label: "ログインする".into(),
            login_url_marker: "login".into(),
            listing_container_selector: "#offer-list".into(),
            item_selector: "#offer-list > .offer".into(),
            page_param: "page".into(),
            page_size: 15,
            page_ceiling: 60,
            navigation_delay: Duration::from_secs(3),
            dedup_on_source_enterprise_id: true,
        }
    }
}

impl Default for SourceB {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteAdapter for SourceB {
    fn config(&self) -> &SiteConfig {
        &self.config
    }

    fn extract(&self, item: &RawItem) -> Result<ExternalListing> {
        let html = ItemHtml::parse(
            &item.html,
            format!("{} item {}", item.page_url, item.sequence),
        );

        let title = html.required("title", ".offer__title")?;
        let company_name = html.required("company_name", ".offer__company")?;

        let mut listing = ExternalListing::new(title, company_name);
        listing.external_source_id = html.attr(".offer", "data-offer-id")?;
        // Unparseable ids are treated as unknown, same as 0
        listing.source_enterprise_id = html
            .attr(".offer", "data-enterprise-id")?
            .and_then(|id| id.parse().ok());

        let rows = html.labeled_rows(".offer__table tr", "th", "td")?;
        apply_rows(&mut listing, &rows, &LABELS);

        let url = match &listing.external_source_id {
            Some(id) => format!("https://partner.source-b.example/offers/{}", id),
            None => item.page_url.clone(),
        };
        listing.record_provenance(self.service(), item.scraped_at, &url);

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::codes::{FinalEducation, Occupation, Prefecture};
    use chrono::Utc;

    fn raw(html: &str) -> RawItem {
        RawItem {
            html: html.to_string(),
            page_url: "https://partner.source-b.example/offers?page=2".into(),
            page_number: 2,
            sequence: 16,
            scraped_at: Utc::now(),
        }
    }

    const OFFER: &str = r#"
      <div class="offer" data-offer-id="98765" data-enterprise-id="5521">
        <h2 class="offer__title">Webエンジニア</h2>
        <p class="offer__company">株式会社ベータ</p>
        <table class="offer__table">
          <tr><th>職種</th><td>エンジニア／開発</td></tr>
          <tr><th>勤務地</th><td>福岡県福岡市</td></tr>
          <tr><th>年齢制限</th><td>25歳〜35歳</td></tr>
          <tr><th>学歴</th><td>大卒以上</td></tr>
          <tr><th>成功報酬</th><td>年収の30%</td></tr>
        </table>
      </div>
    "#;

    #[test]
    fn test_extracts_offer() {
        let listing = SourceB::new().extract(&raw(OFFER)).unwrap();

        assert_eq!(listing.company_name, "株式会社ベータ");
        assert_eq!(listing.source_enterprise_id, Some(5521));
        assert_eq!(listing.external_source_id.as_deref(), Some("98765"));
        assert_eq!(listing.occupations, vec![Occupation::Engineer, Occupation::Engineer]);
        assert_eq!(listing.prefectures, vec![Prefecture::Fukuoka]);
        assert_eq!((listing.age_min, listing.age_max), (Some(25), Some(35)));
        assert_eq!(listing.final_education, Some(FinalEducation::University));
        assert_eq!(listing.commission, "年収の30%");
        assert!(listing.secret_memo.contains("/offers/98765"));
    }

    #[test]
    fn test_garbage_enterprise_id_is_unknown() {
        let html = OFFER.replace("data-enterprise-id=\"5521\"", "data-enterprise-id=\"n/a\"");
        let listing = SourceB::new().extract(&raw(&html)).unwrap();
        assert_eq!(listing.known_source_enterprise_id(), None);
    }
}
