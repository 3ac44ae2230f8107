//! The canonical scraped unit and the raw item it is extracted from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codes::{
    EmploymentStatus, FinalEducation, Gender, HolidayType, Industry, Occupation, Prefecture,
};
use super::ids::{BillingAddressId, CompanyId};
use super::job::ServiceType;

/// One listing element as captured from a result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// Outer HTML of the item element, read after scrolling it into view
    pub html: String,

    /// Result page the item was found on
    pub page_url: String,

    /// 1-based page number
    pub page_number: usize,

    /// Position in the overall crawl (1-based)
    pub sequence: usize,

    pub scraped_at: DateTime<Utc>,
}

/// How dedup resolved an id: reused from earlier or freshly assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolved<T> {
    /// Matched a row persisted before this run
    Existing(T),
    /// Matched an earlier listing in the same batch
    Batch(T),
    /// No match; the writer creates the row with this id
    New(T),
}

impl<T: Copy> Resolved<T> {
    pub fn id(&self) -> T {
        match self {
            Self::Existing(id) | Self::Batch(id) | Self::New(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// A scraped job listing normalized to the platform's schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalListing {
    // Identity
    pub title: String,
    pub company_name: String,
    /// Listing identifier on the external site
    pub external_source_id: Option<String>,
    /// Enterprise identifier on the external site; `0` means unknown
    pub source_enterprise_id: Option<u64>,

    // Commercial terms
    pub commission: String,
    pub refund_policy: String,

    // Job content
    pub work_detail: String,
    pub work_location: String,
    pub working_hours: String,
    pub holiday_detail: String,
    /// Yen per year
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub age_min: Option<i16>,
    pub age_max: Option<i16>,
    pub required_experience: String,

    // Facets
    pub industries: Vec<Industry>,
    pub occupations: Vec<Occupation>,
    pub prefectures: Vec<Prefecture>,
    pub employment_statuses: Vec<EmploymentStatus>,
    pub gender: Option<Gender>,
    pub holiday_type: Option<HolidayType>,
    pub final_education: Option<FinalEducation>,

    /// Provenance notes: source, timestamp, URL
    pub secret_memo: String,

    // Filled by dedup
    #[serde(skip)]
    pub enterprise_id: Option<Resolved<CompanyId>>,
    #[serde(skip)]
    pub billing_address_id: Option<Resolved<BillingAddressId>>,
}

impl ExternalListing {
    /// Create a listing with its identity fields.
    pub fn new(title: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company_name: company_name.into(),
            ..Default::default()
        }
    }

    /// Append a provenance block to the secret memo.
    pub fn record_provenance(
        &mut self,
        service: ServiceType,
        scraped_at: DateTime<Utc>,
        url: &str,
    ) {
        if !self.secret_memo.is_empty() {
            self.secret_memo.push('\n');
        }
        self.secret_memo.push_str(&format!(
            "取得元: {}\n取得日時: {}\nURL: {}",
            service.label(),
            scraped_at.format("%Y-%m-%d %H:%M:%S UTC"),
            url
        ));
    }

    /// Remove duplicate codes from each facet set. Order is not meaningful.
    pub fn dedupe_facets(&mut self) {
        fn dedupe<T: Ord>(values: &mut Vec<T>) {
            values.sort();
            values.dedup();
        }
        dedupe(&mut self.industries);
        dedupe(&mut self.occupations);
        dedupe(&mut self.prefectures);
        dedupe(&mut self.employment_statuses);
    }

    /// Source enterprise id with `0` folded into unknown.
    pub fn known_source_enterprise_id(&self) -> Option<u64> {
        self.source_enterprise_id.filter(|id| *id != 0)
    }
}
