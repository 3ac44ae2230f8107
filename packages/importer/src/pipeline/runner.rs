//! The scheduled trigger: pick a due job, claim it, run it inside the
//! recovery boundary, report failures.

use chrono::{DateTime, Utc};
use futures::{FutureExt, TryStreamExt};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dedup::{self, DedupStats};
use super::panic_trace;
use super::persist;
use super::report::FailureReporter;
use super::stage::{RunStage, StageTracker};
use crate::config::RunConfig;
use crate::crawler::{CrawlLimits, Crawler};
use crate::error::{ImportError, Result};
use crate::normalize::normalize_batch;
use crate::security::{CredentialVault, LoginCredentials};
use crate::sites::SiteRegistry;
use crate::traits::browser::BrowserLauncher;
use crate::traits::mailer::OperatorMailer;
use crate::traits::site::SiteAdapter;
use crate::traits::store::{EnterpriseStore, ImportJobStore};
use crate::types::entities::WriteSummary;
use crate::types::ids::ImportJobId;
use crate::types::job::{ImportJob, ServiceType};
use crate::types::listing::{ExternalListing, RawItem};

/// Upper bound on the time a cancelled run gets to unwind before it is
/// dropped. Short timeouts get a grace period equal to the timeout.
const CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing due, or every due job was unsupported or claimed elsewhere
    Idle,
    Completed(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub job_id: ImportJobId,
    pub service: ServiceType,
    pub items_scraped: usize,
    pub dedup: DedupStats,
    pub written: WriteSummary,
}

/// Runs due import jobs.
pub struct ImportRunner {
    jobs: Arc<dyn ImportJobStore>,
    enterprises: Arc<dyn EnterpriseStore>,
    launcher: Arc<dyn BrowserLauncher>,
    sites: SiteRegistry,
    vault: Arc<CredentialVault>,
    reporter: FailureReporter,
    run: RunConfig,
}

impl ImportRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn ImportJobStore>,
        enterprises: Arc<dyn EnterpriseStore>,
        launcher: Arc<dyn BrowserLauncher>,
        sites: SiteRegistry,
        vault: Arc<CredentialVault>,
        mailer: Arc<dyn OperatorMailer>,
        operator_email: impl Into<String>,
        run: RunConfig,
    ) -> Self {
        let reporter = FailureReporter::new(
            mailer,
            operator_email,
            run.environment,
            run.schedule_offset,
        );
        Self {
            jobs,
            enterprises,
            launcher,
            sites,
            vault,
            reporter,
            run,
        }
    }

    /// Run the first due job this runner can claim.
    ///
    /// Jobs for sources without an adapter are skipped, as are jobs another
    /// runner holds. Failures are reported and returned.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let due = self.jobs.find_due(now, self.run.schedule_offset).await?;
        debug!(count = due.len(), "Due import jobs");

        let lease = chrono::Duration::from_std(self.run.lease)
            .map_err(|e| ImportError::Config(format!("invalid lease: {}", e)))?;

        for job in due {
            let Some(site) = self.sites.get(job.service_type) else {
                debug!(job_id = %job.id, service = %job.service_type, "No adapter, skipping");
                continue;
            };

            if !self
                .jobs
                .claim(job.id, &self.run.runner_id, now, now + lease)
                .await?
            {
                info!(job_id = %job.id, "Job claimed by another runner, skipping");
                continue;
            }

            return self.run_job(job, site).await.map(RunOutcome::Completed);
        }

        Ok(RunOutcome::Idle)
    }

    /// The recovery boundary around one job.
    async fn run_job(&self, job: ImportJob, site: Arc<dyn SiteAdapter>) -> Result<RunSummary> {
        info!(
            job_id = %job.id,
            service = %job.service_type,
            offset = job.offset,
            max_count = job.max_count,
            environment = ?self.run.environment,
            "Starting import run"
        );

        let stage = StageTracker::new();
        let cancel = CancellationToken::new();
        let timeout = self.run.run_timeout;

        let watchdog = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = {
            let _armed = panic_trace::arm();
            let work = AssertUnwindSafe(self.execute(&job, site.as_ref(), &stage, cancel.clone()))
                .catch_unwind();

            match tokio::time::timeout(timeout + timeout.min(CANCEL_GRACE), work).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(panic_trace::into_error(payload)),
                Err(_) => Err(ImportError::Timeout {
                    seconds: timeout.as_secs(),
                }),
            }
        };
        watchdog.abort();

        match result {
            Ok(summary) => {
                stage.enter(RunStage::Succeeded);
                info!(
                    job_id = %job.id,
                    items = summary.items_scraped,
                    postings = summary.written.job_postings_created,
                    companies = summary.written.companies_created,
                    "Import run succeeded"
                );
                Ok(summary)
            }
            Err(err) => {
                let failed_at = stage.current();
                stage.enter(RunStage::Failed);
                error!(
                    job_id = %job.id,
                    stage = %failed_at,
                    kind = err.kind(),
                    error = %err,
                    "Import run failed"
                );

                self.reporter.report(&job, failed_at, &err).await;

                if let Err(release_err) = self.jobs.release_claim(job.id, &self.run.runner_id).await {
                    warn!(job_id = %job.id, error = %release_err, "Failed to release job claim");
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        job: &ImportJob,
        site: &dyn SiteAdapter,
        stage: &StageTracker,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        stage.enter(RunStage::Authenticating);
        let password = self.vault.decrypt_str(&job.encrypted_password)?;
        let credentials = LoginCredentials::new(job.login_id.clone(), password);

        // Dropping the session on any exit closes the browser
        let session = self.launcher.launch(&self.run).await?;
        site.login(session.as_ref(), &credentials).await?;

        stage.enter(RunStage::Crawling);
        let limits = CrawlLimits {
            offset: job.offset,
            max_count: job.max_count,
            item_cap: self.run.effective_item_cap(),
        };
        let raw_items: Vec<RawItem> = Crawler::new(site, session.as_ref())
            .with_cancellation(cancel, self.run.run_timeout.as_secs())
            .crawl(&job.search_url, limits)
            .try_collect()
            .await?;
        drop(session);
        info!(job_id = %job.id, items = raw_items.len(), "Crawl finished");

        stage.enter(RunStage::Extracting);
        let mut listings = raw_items
            .iter()
            .map(|item| site.extract(item))
            .collect::<Result<Vec<ExternalListing>>>()?;
        normalize_batch(&mut listings);

        stage.enter(RunStage::Deduplicating);
        let names: Vec<String> = listings
            .iter()
            .map(|l| l.company_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing_companies = self
            .enterprises
            .find_companies_by_name(job.agency_id, &names)
            .await?;
        let existing_billing = self
            .enterprises
            .find_billing_addresses_by_name(job.agency_id, &names)
            .await?;
        let dedup = dedup::resolve(
            &mut listings,
            &existing_companies,
            &existing_billing,
            site.config().dedup_on_source_enterprise_id,
        );

        stage.enter(RunStage::Persisting);
        let plan = persist::build_plan(job, &listings, Utc::now())?;
        // Also flags the job succeeded
        let written = persist::write(self.enterprises.as_ref(), &plan).await?;

        Ok(RunSummary {
            job_id: job.id,
            service: job.service_type,
            items_scraped: raw_items.len(),
            dedup,
            written,
        })
    }
}
