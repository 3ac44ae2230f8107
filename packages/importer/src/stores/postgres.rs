//! PostgreSQL storage implementation.
//!
//! Creates its tables on startup (`CREATE TABLE IF NOT EXISTS`). The
//! `(start_date, start_hour)` uniqueness of import jobs is a table
//! constraint; a batch commit is one transaction.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ImportError, Result};
use crate::traits::store::{EnterpriseStore, ImportJobStore};
use crate::types::entities::{WritePlan, WriteSummary};
use crate::types::ids::{AgencyId, BillingAddressId, CompanyId, Id, ImportJobId};
use crate::types::job::{ImportJob, ServiceType};

/// PostgreSQL-backed job and enterprise store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn storage_err(e: sqlx::Error) -> ImportError {
    ImportError::persistence(e)
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    staff_id: Uuid,
    agency_id: Uuid,
    service_type: ServiceType,
    login_id: String,
    encrypted_password: String,
    start_date: NaiveDate,
    start_hour: i16,
    max_count: i64,
    start_offset: i64,
    search_url: String,
    succeeded: bool,
    claimed_by: Option<String>,
    claimed_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for ImportJob {
    type Error = ImportError;

    fn try_from(row: JobRow) -> Result<Self> {
        let out_of_range =
            |field: &str| ImportError::persistence(format!("import_jobs.{} out of range", field));
        Ok(ImportJob {
            id: Id::from_uuid(row.id),
            staff_id: Id::from_uuid(row.staff_id),
            agency_id: Id::from_uuid(row.agency_id),
            service_type: row.service_type,
            login_id: row.login_id,
            encrypted_password: row.encrypted_password,
            start_date: row.start_date,
            start_hour: u8::try_from(row.start_hour).map_err(|_| out_of_range("start_hour"))?,
            max_count: usize::try_from(row.max_count).map_err(|_| out_of_range("max_count"))?,
            offset: usize::try_from(row.start_offset).map_err(|_| out_of_range("start_offset"))?,
            search_url: row.search_url,
            succeeded: row.succeeded,
            claimed_by: row.claimed_by,
            claimed_until: row.claimed_until,
            created_at: row.created_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, staff_id, agency_id, service_type, login_id, encrypted_password, \
     start_date, start_hour, max_count, start_offset, search_url, succeeded, claimed_by, \
     claimed_until, created_at";

impl PostgresStore {
    /// Create a new PostgreSQL store with the given connection URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage_err)?;

        Self::from_pool(pool).await
    }

    /// Create a store from an existing pool and make sure the schema exists.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        let statements = [
            r#"
            DO $$ BEGIN
                CREATE TYPE import_service_type AS ENUM ('source_a', 'source_b');
            EXCEPTION WHEN duplicate_object THEN NULL;
            END $$
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS import_jobs (
                id UUID PRIMARY KEY,
                staff_id UUID NOT NULL,
                agency_id UUID NOT NULL,
                service_type import_service_type NOT NULL,
                login_id TEXT NOT NULL,
                encrypted_password TEXT NOT NULL,
                start_date DATE NOT NULL,
                start_hour SMALLINT NOT NULL CHECK (start_hour BETWEEN 0 AND 23),
                max_count BIGINT NOT NULL CHECK (max_count >= 0),
                start_offset BIGINT NOT NULL CHECK (start_offset >= 0),
                search_url TEXT NOT NULL,
                succeeded BOOLEAN NOT NULL DEFAULT FALSE,
                claimed_by TEXT,
                claimed_until TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (start_date, start_hour)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS companies (
                id UUID PRIMARY KEY,
                agency_id UUID NOT NULL,
                company_name TEXT NOT NULL,
                staff_id UUID NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_companies_agency_name ON companies(agency_id, company_name)",
            r#"
            CREATE TABLE IF NOT EXISTS reference_materials (
                id UUID PRIMARY KEY,
                company_id UUID NOT NULL REFERENCES companies(id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS company_industries (
                company_id UUID NOT NULL REFERENCES companies(id),
                industry SMALLINT NOT NULL,
                PRIMARY KEY (company_id, industry)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS billing_addresses (
                id UUID PRIMARY KEY,
                agency_id UUID NOT NULL,
                company_id UUID NOT NULL REFERENCES companies(id),
                company_name TEXT NOT NULL,
                commission TEXT NOT NULL DEFAULT '',
                refund_policy TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_billing_addresses_agency_name ON billing_addresses(agency_id, company_name)",
            r#"
            CREATE TABLE IF NOT EXISTS job_postings (
                id UUID PRIMARY KEY,
                agency_id UUID NOT NULL,
                billing_address_id UUID NOT NULL REFERENCES billing_addresses(id),
                import_job_id UUID NOT NULL REFERENCES import_jobs(id),
                title TEXT NOT NULL,
                external_source_id TEXT,
                work_detail TEXT NOT NULL DEFAULT '',
                work_location TEXT NOT NULL DEFAULT '',
                working_hours TEXT NOT NULL DEFAULT '',
                holiday_detail TEXT NOT NULL DEFAULT '',
                salary_min BIGINT,
                salary_max BIGINT,
                age_min SMALLINT,
                age_max SMALLINT,
                required_experience TEXT NOT NULL DEFAULT '',
                gender SMALLINT,
                holiday_type SMALLINT,
                final_education SMALLINT,
                secret_memo TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_posting_prefectures (
                job_posting_id UUID NOT NULL REFERENCES job_postings(id),
                prefecture SMALLINT NOT NULL,
                PRIMARY KEY (job_posting_id, prefecture)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_posting_occupations (
                job_posting_id UUID NOT NULL REFERENCES job_postings(id),
                occupation SMALLINT NOT NULL,
                PRIMARY KEY (job_posting_id, occupation)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_posting_employment_statuses (
                job_posting_id UUID NOT NULL REFERENCES job_postings(id),
                employment_status SMALLINT NOT NULL,
                PRIMARY KEY (job_posting_id, employment_status)
            )
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }

        info!("Import schema ready");
        Ok(())
    }

    async fn write_plan(tx: &mut Transaction<'_, Postgres>, plan: &WritePlan) -> sqlx::Result<()> {
        for c in &plan.companies {
            sqlx::query(
                "INSERT INTO companies (id, agency_id, company_name, staff_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(c.id.into_uuid())
            .bind(c.agency_id.into_uuid())
            .bind(&c.company_name)
            .bind(c.staff_id.into_uuid())
            .bind(c.created_at)
            .execute(&mut **tx)
            .await?;
        }

        for r in &plan.reference_materials {
            sqlx::query("INSERT INTO reference_materials (id, company_id) VALUES ($1, $2)")
                .bind(r.id.into_uuid())
                .bind(r.company_id.into_uuid())
                .execute(&mut **tx)
                .await?;
        }

        for i in &plan.company_industries {
            sqlx::query(
                "INSERT INTO company_industries (company_id, industry) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(i.company_id.into_uuid())
            .bind(i.industry.code())
            .execute(&mut **tx)
            .await?;
        }

        for b in &plan.billing_addresses {
            sqlx::query(
                "INSERT INTO billing_addresses \
                 (id, agency_id, company_id, company_name, commission, refund_policy, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(b.id.into_uuid())
            .bind(b.agency_id.into_uuid())
            .bind(b.company_id.into_uuid())
            .bind(&b.company_name)
            .bind(&b.commission)
            .bind(&b.refund_policy)
            .bind(b.created_at)
            .execute(&mut **tx)
            .await?;
        }

        for p in &plan.job_postings {
            sqlx::query(
                "INSERT INTO job_postings \
                 (id, agency_id, billing_address_id, import_job_id, title, external_source_id, \
                  work_detail, work_location, working_hours, holiday_detail, salary_min, salary_max, \
                  age_min, age_max, required_experience, gender, holiday_type, final_education, \
                  secret_memo, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                  $17, $18, $19, $20)",
            )
            .bind(p.id.into_uuid())
            .bind(p.agency_id.into_uuid())
            .bind(p.billing_address_id.into_uuid())
            .bind(p.import_job_id.into_uuid())
            .bind(&p.title)
            .bind(&p.external_source_id)
            .bind(&p.work_detail)
            .bind(&p.work_location)
            .bind(&p.working_hours)
            .bind(&p.holiday_detail)
            .bind(p.salary_min)
            .bind(p.salary_max)
            .bind(p.age_min)
            .bind(p.age_max)
            .bind(&p.required_experience)
            .bind(p.gender.map(|g| g.code()))
            .bind(p.holiday_type.map(|h| h.code()))
            .bind(p.final_education.map(|e| e.code()))
            .bind(&p.secret_memo)
            .bind(p.created_at)
            .execute(&mut **tx)
            .await?;
        }

        for row in &plan.prefectures {
            sqlx::query(
                "INSERT INTO job_posting_prefectures (job_posting_id, prefecture) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(row.job_posting_id.into_uuid())
            .bind(row.prefecture.code())
            .execute(&mut **tx)
            .await?;
        }

        for row in &plan.occupations {
            sqlx::query(
                "INSERT INTO job_posting_occupations (job_posting_id, occupation) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(row.job_posting_id.into_uuid())
            .bind(row.occupation.code())
            .execute(&mut **tx)
            .await?;
        }

        for row in &plan.employment_statuses {
            sqlx::query(
                "INSERT INTO job_posting_employment_statuses (job_posting_id, employment_status) \
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(row.job_posting_id.into_uuid())
            .bind(row.employment_status.code())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ImportJobStore for PostgresStore {
    async fn insert_job(&self, job: &ImportJob) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO import_jobs \
             (id, staff_id, agency_id, service_type, login_id, encrypted_password, start_date, \
              start_hour, max_count, start_offset, search_url, succeeded, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(job.id.into_uuid())
        .bind(job.staff_id.into_uuid())
        .bind(job.agency_id.into_uuid())
        .bind(job.service_type)
        .bind(&job.login_id)
        .bind(&job.encrypted_password)
        .bind(job.start_date)
        .bind(i16::from(job.start_hour))
        .bind(job.max_count as i64)
        .bind(job.offset as i64)
        .bind(&job.search_url)
        .bind(job.succeeded)
        .bind(job.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(ImportError::Conflict(format!(
                    "an import is already scheduled for {} {:02}:00",
                    job.start_date, job.start_hour
                )))
            }
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn get_job(&self, id: ImportJobId) -> Result<Option<ImportJob>> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM import_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(ImportJob::try_from).transpose()
    }

    async fn find_due(&self, now: DateTime<Utc>, tz: FixedOffset) -> Result<Vec<ImportJob>> {
        let local = now.with_timezone(&tz);
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM import_jobs \
             WHERE start_date = $1 AND start_hour = $2 AND NOT succeeded \
             ORDER BY created_at",
            JOB_COLUMNS
        ))
        .bind(local.date_naive())
        .bind(local.hour() as i16)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(ImportJob::try_from).collect()
    }

    async fn claim(
        &self,
        id: ImportJobId,
        runner_id: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE import_jobs SET claimed_by = $2, claimed_until = $4 \
             WHERE id = $1 AND NOT succeeded \
               AND (claimed_until IS NULL OR claimed_until <= $3 OR claimed_by = $2) \
             RETURNING id",
        )
        .bind(id.into_uuid())
        .bind(runner_id)
        .bind(now)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(job_id = %id, runner_id, claimed = claimed.is_some(), "Claim attempt");
        Ok(claimed.is_some())
    }

    async fn release_claim(&self, id: ImportJobId, runner_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE import_jobs SET claimed_by = NULL, claimed_until = NULL \
             WHERE id = $1 AND claimed_by = $2",
        )
        .bind(id.into_uuid())
        .bind(runner_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

}

#[async_trait]
impl EnterpriseStore for PostgresStore {
    async fn find_companies_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, CompanyId>> {
        let rows: Vec<(String, Uuid)> = sqlx::query_as(
            "SELECT DISTINCT ON (company_name) company_name, id FROM companies \
             WHERE agency_id = $1 AND company_name = ANY($2) \
             ORDER BY company_name, created_at",
        )
        .bind(agency_id.into_uuid())
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|(name, id)| (name, Id::from_uuid(id)))
            .collect())
    }

    async fn find_billing_addresses_by_name(
        &self,
        agency_id: AgencyId,
        names: &[String],
    ) -> Result<HashMap<String, (BillingAddressId, CompanyId)>> {
        let rows: Vec<(String, Uuid, Uuid)> = sqlx::query_as(
            "SELECT DISTINCT ON (company_name) company_name, id, company_id FROM billing_addresses \
             WHERE agency_id = $1 AND company_name = ANY($2) \
             ORDER BY company_name, created_at",
        )
        .bind(agency_id.into_uuid())
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|(name, id, company_id)| (name, (Id::from_uuid(id), Id::from_uuid(company_id))))
            .collect())
    }

    async fn commit(&self, plan: &WritePlan) -> Result<WriteSummary> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        // Dropping an uncommitted transaction rolls it back
        Self::write_plan(&mut tx, plan).await.map_err(storage_err)?;

        if let Some(id) = plan.completes_job {
            let result = sqlx::query(
                "UPDATE import_jobs SET succeeded = TRUE, claimed_by = NULL, claimed_until = NULL \
                 WHERE id = $1",
            )
            .bind(id.into_uuid())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

            if result.rows_affected() == 0 {
                return Err(ImportError::persistence(format!("job {} not found", id)));
            }
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(WriteSummary::from(plan))
    }
}
