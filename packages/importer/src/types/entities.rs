//! Persisted entities an `ExternalListing` is translated into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codes::{
    EmploymentStatus, FinalEducation, Gender, HolidayType, Industry, Occupation, Prefecture,
};
use super::ids::{
    AgencyId, BillingAddressId, CompanyId, ImportJobId, JobPostingId, ReferenceMaterialId,
    StaffId,
};

/// A hiring company, matched by exact name within an agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: CompanyId,
    pub agency_id: AgencyId,
    pub company_name: String,
    pub staff_id: StaffId,
    pub created_at: DateTime<Utc>,
}

/// Empty placeholder created alongside every new company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceMaterial {
    pub id: ReferenceMaterialId,
    pub company_id: CompanyId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyIndustry {
    pub company_id: CompanyId,
    pub industry: Industry,
}

/// Billing counterpart of a company, also unique by name within an agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingAddress {
    pub id: BillingAddressId,
    pub agency_id: AgencyId,
    pub company_id: CompanyId,
    pub company_name: String,
    pub commission: String,
    pub refund_policy: String,
    pub created_at: DateTime<Utc>,
}

/// A job posting. Never deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobPostingId,
    pub agency_id: AgencyId,
    pub billing_address_id: BillingAddressId,
    pub import_job_id: ImportJobId,
    pub title: String,
    pub external_source_id: Option<String>,
    pub work_detail: String,
    pub work_location: String,
    pub working_hours: String,
    pub holiday_detail: String,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub age_min: Option<i16>,
    pub age_max: Option<i16>,
    pub required_experience: String,
    pub gender: Option<Gender>,
    pub holiday_type: Option<HolidayType>,
    pub final_education: Option<FinalEducation>,
    pub secret_memo: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPostingPrefecture {
    pub job_posting_id: JobPostingId,
    pub prefecture: Prefecture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPostingOccupation {
    pub job_posting_id: JobPostingId,
    pub occupation: Occupation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPostingEmploymentStatus {
    pub job_posting_id: JobPostingId,
    pub employment_status: EmploymentStatus,
}

/// Every row one batch writes. Committed atomically or not at all.
#[derive(Debug, Clone, Default)]
pub struct WritePlan {
    pub companies: Vec<CompanyProfile>,
    pub reference_materials: Vec<ReferenceMaterial>,
    pub company_industries: Vec<CompanyIndustry>,
    pub billing_addresses: Vec<BillingAddress>,
    pub job_postings: Vec<JobPosting>,
    pub prefectures: Vec<JobPostingPrefecture>,
    pub occupations: Vec<JobPostingOccupation>,
    pub employment_statuses: Vec<JobPostingEmploymentStatus>,
    /// Job flagged succeeded, and its lease cleared, by the same commit
    pub completes_job: Option<ImportJobId>,
}

impl WritePlan {
    pub fn is_empty(&self) -> bool {
        self.job_postings.is_empty() && self.companies.is_empty()
    }
}

/// Row counts written by one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub companies_created: usize,
    pub billing_addresses_created: usize,
    pub job_postings_created: usize,
}

impl From<&WritePlan> for WriteSummary {
    fn from(plan: &WritePlan) -> Self {
        Self {
            companies_created: plan.companies.len(),
            billing_addresses_created: plan.billing_addresses.len(),
            job_postings_created: plan.job_postings.len(),
        }
    }
}
