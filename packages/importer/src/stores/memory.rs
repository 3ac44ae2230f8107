//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{ImportError, Result};
use crate::traits::store::{EnterpriseStore, ImportJobStore};
use crate::types::entities::{
    BillingAddress, CompanyIndustry, CompanyProfile, JobPosting, JobPostingEmploymentStatus,
    JobPostingOccupation, JobPostingPrefecture, ReferenceMaterial, WritePlan, WriteSummary,
};
use crate::types::ids::{AgencyId, BillingAddressId, CompanyId, ImportJobId};
use crate::types::job::ImportJob;

#[derive(Default)]
struct Tables {
    companies: Vec<CompanyProfile>,
    reference_materials: Vec<ReferenceMaterial>,
    company_industries: Vec<CompanyIndustry>,
    billing_addresses: Vec<BillingAddress>,
    job_postings: Vec<JobPosting>,
    prefectures: Vec<JobPostingPrefecture>,
    occupations: Vec<JobPostingOccupation>,
    employment_statuses: Vec<JobPostingEmploymentStatus>,
}

/// In-memory storage for jobs and imported entities.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<ImportJobId, ImportJob>>,
    tables: RwLock<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail without writing.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn job(&self, id: ImportJobId) -> Option<ImportJob> {
        self.jobs.read().unwrap().get(&id).cloned()
    }

    pub fn company_count(&self) -> usize {
        self.tables.read().unwrap().companies.len()
    }

    pub fn billing_address_count(&self) -> usize {
        self.tables.read().unwrap().billing_addresses.len()
    }

    pub fn job_posting_count(&self) -> usize {
        self.tables.read().unwrap().job_postings.len()
    }

    pub fn reference_material_count(&self) -> usize {
        self.tables.read().unwrap().reference_materials.len()
    }

    pub fn company_industry_count(&self) -> usize {
        self.tables.read().unwrap().company_industries.len()
    }

    pub fn prefecture_count(&self) -> usize {
        self.tables.read().unwrap().prefectures.len()
    }

    pub fn occupation_count(&self) -> usize {
        self.tables.read().unwrap().occupations.len()
    }

    pub fn employment_status_count(&self) -> usize {
        self.tables.read().unwrap().employment_statuses.len()
    }

    /// Company names for an agency, in insertion order.
    pub fn company_names(&self, agency_id: AgencyId) -> Vec<String> {
        self.tables
            .read()
            .unwrap()
            .companies
            .iter()
            .filter(|c| c.agency_id == agency_id)
            .map(|c| c.company_name.clone())
            .collect()
    }

    pub fn job_postings(&self) -> Vec<JobPosting> {
        self.tables.read().unwrap().job_postings.clone()
    }
}

/// Check that every reference in the plan points at a row that exists
/// already or is created by the plan itself.
fn validate(tables: &Tables, plan: &WritePlan) -> Result<()> {
    let companies: HashSet<CompanyId> = tables
        .companies
        .iter()
        .chain(plan.companies.iter())
        .map(|c| c.id)
        .collect();
    let billing_addresses: HashSet<BillingAddressId> = tables
        .billing_addresses
        .iter()
        .chain(plan.billing_addresses.iter())
        .map(|b| b.id)
        .collect();

    if let Some(b) = plan
        .billing_addresses
        .iter()
        .find(|b| !companies.contains(&b.company_id))
    {
        return Err(ImportError::persistence(format!(
            "billing address {} references unknown company {}",
            b.id, b.company_id
        )));
    }
    if let Some(p) = plan
        .job_postings
        .iter()
        .find(|p| !billing_addresses.contains(&p.billing_address_id))
    {
        return Err(ImportError::persistence(format!(
            "job posting {} references unknown billing address {}",
            p.id, p.billing_address_id
        )));
    }
    if let Some(c) = plan
        .companies
        .iter()
        .find(|c| tables.companies.iter().any(|existing| existing.id == c.id))
    {
        return Err(ImportError::persistence(format!(
            "company {} already exists",
            c.id
        )));
    }
    Ok(())
}

#[async_trait]
impl ImportJobStore for MemoryStore {
    async fn insert_job(&self, job: &ImportJob) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs
            .values()
            .any(|j| j.start_date == job.start_date && j.start_hour == job.start_hour)
        {
            return Err(ImportError::Conflict(format!(
                "an import is already scheduled for {} {:02}:00",
                job.start_date, job.start_hour
            )));
        }
        if jobs.contains_key(&job.id) {
            return Err(ImportError::Conflict(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: ImportJobId) -> Result<Option<ImportJob>> {
        Ok(self.jobs.read().unwrap().get(&id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>, tz: FixedOffset) -> Result<Vec<ImportJob>> {
        let mut due: Vec<ImportJob> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|job| job.is_due(now, tz))
            .cloned()
            .collect();
        due.sort_by_key(|job| job.created_at);
        Ok(due)
    }

    async fn claim(
        &self,
        id: ImportJobId,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut jobs = self.jobs.write().unwrap();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        let held_elsewhere =
            job.is_leased(now) && job.claimed_by.as_deref() != Some(runner_id);
        if job.succeeded || held_elsewhere {
            return Ok(false);
        }
        job.claimed_by = Some(runner_id.to_string());
        job.claimed_until = Some(lease_until);
        Ok(true)
    }

    async fn release_claim(&self, id: ImportJobId, runner_id: &str) -> Result<()> {
        if let Some(job) = self.jobs.write().unwrap().get_mut(&id) {
            if job.claimed_by.as_deref() == Some(runner_id) {
                job.claimed_by = None;
                job.claimed_until = None;
            }
        }
        Ok(())
    }

}

#[async_trait]
impl EnterpriseStore for MemoryStore {
    async fn find_companies_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, CompanyId>> {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut found = HashMap::new();
        for company in &self.tables.read().unwrap().companies {
            if company.agency_id == agency_id && wanted.contains(company.company_name.as_str()) {
                found
                    .entry(company.company_name.clone())
                    .or_insert(company.id);
            }
        }
        Ok(found)
    }

    async fn find_billing_addresses_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, (BillingAddressId, CompanyId)>> {
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut found = HashMap::new();
        for billing in &self.tables.read().unwrap().billing_addresses {
            if billing.agency_id == agency_id && wanted.contains(billing.company_name.as_str()) {
                found
                    .entry(billing.company_name.clone())
                    .or_insert((billing.id, billing.company_id));
            }
        }
        Ok(found)
    }

    async fn commit(&self, plan: &WritePlan) -> Result<WriteSummary> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ImportError::persistence("commit rejected by test store"));
        }

        let mut tables = self.tables.write().unwrap();
        let mut jobs = self.jobs.write().unwrap();
        validate(&tables, plan)?;

        if let Some(id) = plan.completes_job {
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| ImportError::persistence(format!("job {} not found", id)))?;
            job.succeeded = true;
            job.claimed_by = None;
            job.claimed_until = None;
        }

        tables.companies.extend(plan.companies.iter().cloned());
        tables
            .reference_materials
            .extend(plan.reference_materials.iter().cloned());
        tables
            .company_industries
            .extend(plan.company_industries.iter().cloned());
        tables
            .billing_addresses
            .extend(plan.billing_addresses.iter().cloned());
        tables.job_postings.extend(plan.job_postings.iter().cloned());
        tables.prefectures.extend(plan.prefectures.iter().cloned());
        tables.occupations.extend(plan.occupations.iter().cloned());
        tables
            .employment_statuses
            .extend(plan.employment_statuses.iter().cloned());

        Ok(WriteSummary::from(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_job;
    use crate::types::ids::JobPostingId;
    use crate::types::job::ServiceType;
    use chrono::Duration;

    #[tokio::test]
    async fn test_slot_uniqueness() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);
        store.insert_job(&job).await.unwrap();

        let mut clash = sample_job(ServiceType::SourceB);
        clash.start_date = job.start_date;
        clash.start_hour = job.start_hour;
        let err = store.insert_job(&clash).await.unwrap_err();
        assert!(matches!(err, ImportError::Conflict(_)));

        clash.start_hour = (job.start_hour + 1) % 24;
        store.insert_job(&clash).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_lease_expires() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);
        store.insert_job(&job).await.unwrap();
        let now = Utc::now();

        assert!(store.claim(job.id, "a", now, now + Duration::hours(1)).await.unwrap());
        assert!(!store.claim(job.id, "b", now, now + Duration::hours(1)).await.unwrap());

        let later = now + Duration::hours(2);
        assert!(store.claim(job.id, "b", later, later + Duration::hours(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_then_commit_completes_job() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);
        store.insert_job(&job).await.unwrap();
        let now = Utc::now();

        assert!(store.claim(job.id, "a", now, now + Duration::hours(1)).await.unwrap());
        store.release_claim(job.id, "a").await.unwrap();
        assert!(store.claim(job.id, "b", now, now + Duration::hours(1)).await.unwrap());

        let plan = WritePlan {
            completes_job: Some(job.id),
            ..Default::default()
        };
        store.commit(&plan).await.unwrap();

        let stored = store.job(job.id).unwrap();
        assert!(stored.succeeded);
        assert_eq!(stored.claimed_by, None);
        assert!(!store.claim(job.id, "b", now, now + Duration::hours(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_for_unknown_job_writes_nothing() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);

        let mut plan = WritePlan {
            completes_job: Some(job.id),
            ..Default::default()
        };
        plan.companies.push(CompanyProfile {
            id: CompanyId::new(),
            agency_id: job.agency_id,
            company_name: "Acme".into(),
            staff_id: job.staff_id,
            created_at: Utc::now(),
        });

        let err = store.commit(&plan).await.unwrap_err();
        assert!(matches!(err, ImportError::Persistence(_)));
        assert_eq!(store.company_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_job_pending() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);
        store.insert_job(&job).await.unwrap();
        store.fail_commits(true);

        let plan = WritePlan {
            completes_job: Some(job.id),
            ..Default::default()
        };
        assert!(store.commit(&plan).await.is_err());
        assert!(!store.job(job.id).unwrap().succeeded);
    }

    #[tokio::test]
    async fn test_invalid_plan_writes_nothing() {
        let store = MemoryStore::new();
        let job = sample_job(ServiceType::SourceA);

        let mut plan = WritePlan::default();
        plan.job_postings.push(JobPosting {
            id: JobPostingId::new(),
            agency_id: job.agency_id,
            billing_address_id: BillingAddressId::new(),
            import_job_id: job.id,
            title: "営業".into(),
            external_source_id: None,
            work_detail: String::new(),
            work_location: String::new(),
            working_hours: String::new(),
            holiday_detail: String::new(),
            salary_min: None,
            salary_max: None,
            age_min: None,
            age_max: None,
            required_experience: String::new(),
            gender: None,
            holiday_type: None,
            final_education: None,
            secret_memo: String::new(),
            created_at: Utc::now(),
        });

        let err = store.commit(&plan).await.unwrap_err();
        assert!(matches!(err, ImportError::Persistence(_)));
        assert_eq!(store.job_posting_count(), 0);
    }
}
