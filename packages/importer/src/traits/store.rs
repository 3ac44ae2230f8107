//! Storage traits for import jobs and the entities an import writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::types::entities::{WritePlan, WriteSummary};
use crate::types::ids::{AgencyId, BillingAddressId, CompanyId, ImportJobId};
use crate::types::job::ImportJob;

/// Scheduled import requests.
#[async_trait]
pub trait ImportJobStore: Send + Sync {
    /// Insert a job. `ImportError::Conflict` if another job already uses
    /// the same `(start_date, start_hour)`.
    async fn insert_job(&self, job: &ImportJob) -> Result<()>;

    async fn get_job(&self, id: ImportJobId) -> Result<Option<ImportJob>>;

    /// Jobs not yet succeeded whose start slot contains `now`, oldest first.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        tz: chrono::FixedOffset,
    ) -> Result<Vec<ImportJob>>;

    /// Take a lease on the job. Returns `false` when another runner holds
    /// an unexpired lease or the job already succeeded.
    async fn claim(
        &self,
        id: ImportJobId,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool>;

    /// Drop this runner's lease without marking success.
    async fn release_claim(&self, id: ImportJobId, runner_id: &str) -> Result<()>;
}

/// Companies, billing addresses and postings.
#[async_trait]
pub trait EnterpriseStore: Send + Sync {
    /// Existing company ids by exact name for the agency. Names without a
    /// row are absent from the map.
    async fn find_companies_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, CompanyId>>;

    /// Existing billing address ids (with owning company) by exact name.
    async fn find_billing_addresses_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, (BillingAddressId, CompanyId)>>;

    /// Write every row of the plan atomically.
    ///
    /// When the plan names `completes_job`, the job's success flag is set in
    /// the same transaction, so a batch is never persisted without it. The
    /// job must live in the same database as the entities.
    async fn commit(&self, plan: &WritePlan) -> Result<WriteSummary>;
}
