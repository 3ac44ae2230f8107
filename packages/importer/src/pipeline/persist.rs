//! Translate resolved listings into rows and commit them as one unit.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

use crate::error::{ImportError, Result};
use crate::traits::store::EnterpriseStore;
use crate::types::entities::{
    BillingAddress, CompanyIndustry, CompanyProfile, JobPosting, JobPostingEmploymentStatus,
    JobPostingOccupation, JobPostingPrefecture, ReferenceMaterial, WritePlan, WriteSummary,
};
use crate::types::ids::{CompanyId, JobPostingId, ReferenceMaterialId};
use crate::types::job::ImportJob;
use crate::types::listing::{ExternalListing, Resolved};

/// Build every row the batch needs.
///
/// New companies get an empty reference material and their industry rows;
/// new billing addresses are created once; every listing becomes a posting.
/// Committing the plan also completes `job`.
pub fn build_plan(
    job: &ImportJob,
    listings: &[ExternalListing],
    now: DateTime<Utc>,
) -> Result<WritePlan> {
    let mut plan = WritePlan {
        completes_job: Some(job.id),
        ..Default::default()
    };
    let mut created_companies: HashSet<CompanyId> = HashSet::new();

    for (position, listing) in listings.iter().enumerate() {
        let (company, billing) = match (listing.enterprise_id, listing.billing_address_id) {
            (Some(company), Some(billing)) => (company, billing),
            _ => {
                return Err(ImportError::persistence(format!(
                    "listing {} ({}) was not resolved before persisting",
                    position + 1,
                    listing.company_name
                )))
            }
        };

        if let Resolved::New(company_id) = company {
            if created_companies.insert(company_id) {
                plan.companies.push(CompanyProfile {
                    id: company_id,
                    agency_id: job.agency_id,
                    company_name: listing.company_name.clone(),
                    staff_id: job.staff_id,
                    created_at: now,
                });
                plan.reference_materials.push(ReferenceMaterial {
                    id: ReferenceMaterialId::new(),
                    company_id,
                });
                plan.company_industries
                    .extend(listing.industries.iter().map(|industry| CompanyIndustry {
                        company_id,
                        industry: *industry,
                    }));
            }
        }

        if let Resolved::New(billing_id) = billing {
            plan.billing_addresses.push(BillingAddress {
                id: billing_id,
                agency_id: job.agency_id,
                company_id: company.id(),
                company_name: listing.company_name.clone(),
                commission: listing.commission.clone(),
                refund_policy: listing.refund_policy.clone(),
                created_at: now,
            });
        }

        let posting_id = JobPostingId::new();
        plan.job_postings.push(JobPosting {
            id: posting_id,
            agency_id: job.agency_id,
            billing_address_id: billing.id(),
            import_job_id: job.id,
            title: listing.title.clone(),
            external_source_id: listing.external_source_id.clone(),
            work_detail: listing.work_detail.clone(),
            work_location: listing.work_location.clone(),
            working_hours: listing.working_hours.clone(),
            holiday_detail: listing.holiday_detail.clone(),
            salary_min: listing.salary_min,
            salary_max: listing.salary_max,
            age_min: listing.age_min,
            age_max: listing.age_max,
            required_experience: listing.required_experience.clone(),
            gender: listing.gender,
            holiday_type: listing.holiday_type,
            final_education: listing.final_education,
            secret_memo: listing.secret_memo.clone(),
            created_at: now,
        });
        plan.prefectures
            .extend(listing.prefectures.iter().map(|prefecture| JobPostingPrefecture {
                job_posting_id: posting_id,
                prefecture: *prefecture,
            }));
        plan.employment_statuses.extend(listing.employment_statuses.iter().map(|status| {
            JobPostingEmploymentStatus {
                job_posting_id: posting_id,
                employment_status: *status,
            }
        }));
        plan.occupations
            .extend(listing.occupations.iter().map(|occupation| JobPostingOccupation {
                job_posting_id: posting_id,
                occupation: *occupation,
            }));
    }

    Ok(plan)
}

/// Commit the plan. Store failures surface as persistence errors.
pub async fn write(store: &dyn EnterpriseStore, plan: &WritePlan) -> Result<WriteSummary> {
    let summary = store.commit(plan).await.map_err(|e| match e {
        ImportError::Persistence(_) => e,
        other => ImportError::persistence(other),
    })?;

    info!(
        companies = summary.companies_created,
        billing_addresses = summary.billing_addresses_created,
        job_postings = summary.job_postings_created,
        "Batch committed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dedup::resolve;
    use crate::types::codes::{Industry, Prefecture};
    use crate::types::ids::{AgencyId, ImportJobId, StaffId};
    use crate::types::job::ServiceType;
    use std::collections::HashMap;

    fn job() -> ImportJob {
        ImportJob {
            id: ImportJobId::new(),
            staff_id: StaffId::new(),
            agency_id: AgencyId::new(),
            service_type: ServiceType::SourceA,
            login_id: "staff@example.com".into(),
            encrypted_password: String::new(),
            start_date: Utc::now().date_naive(),
            start_hour: 10,
            max_count: 10,
            offset: 0,
            search_url: "https://a.example/search".into(),
            succeeded: false,
            claimed_by: None,
            claimed_until: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_creates_company_once() {
        let mut a = ExternalListing::new("営業", "Acme");
        a.industries = vec![Industry::Finance, Industry::Trading];
        a.prefectures = vec![Prefecture::Tokyo];
        let b = ExternalListing::new("経理", "Acme");
        let mut batch = vec![a, b];
        resolve(&mut batch, &HashMap::new(), &HashMap::new(), false);

        let job = job();
        let plan = build_plan(&job, &batch, Utc::now()).unwrap();

        assert_eq!(plan.completes_job, Some(job.id));
        assert_eq!(plan.companies.len(), 1);
        assert_eq!(plan.reference_materials.len(), 1);
        assert_eq!(plan.company_industries.len(), 2);
        assert_eq!(plan.billing_addresses.len(), 1);
        assert_eq!(plan.job_postings.len(), 2);
        assert_eq!(plan.prefectures.len(), 1);
        assert_eq!(
            plan.job_postings[0].billing_address_id,
            plan.job_postings[1].billing_address_id
        );
    }

    #[test]
    fn test_existing_company_only_adds_posting() {
        let company = CompanyId::new();
        let billing = crate::types::ids::BillingAddressId::new();
        let mut batch = vec![ExternalListing::new("営業", "Acme")];
        resolve(
            &mut batch,
            &HashMap::from([("Acme".to_string(), company)]),
            &HashMap::from([("Acme".to_string(), (billing, company))]),
            false,
        );

        let plan = build_plan(&job(), &batch, Utc::now()).unwrap();

        assert!(plan.companies.is_empty());
        assert!(plan.billing_addresses.is_empty());
        assert_eq!(plan.job_postings.len(), 1);
        assert_eq!(plan.job_postings[0].billing_address_id, billing);
    }

    #[test]
    fn test_unresolved_listing_is_error() {
        let batch = vec![ExternalListing::new("営業", "Acme")];
        let err = build_plan(&job(), &batch, Utc::now()).unwrap_err();
        assert!(matches!(err, ImportError::Persistence(_)));
    }
}
