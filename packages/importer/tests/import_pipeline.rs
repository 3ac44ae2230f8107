//! End-to-end runs of the import pipeline against mocks.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use importer::pipeline::FAILURE_SUBJECT;
use importer::sites::SourceA;
use importer::testing::{
    listing_page_html, listing_page_html_with_ids, sample_job, test_vault, MockBrowser,
    MockLauncher, MockMailer, MockSite,
};
use importer::{
    CredentialVault, Environment, ImportError, ImportJob, ImportJobStore, ImportRunner,
    MemoryStore, RunConfig, RunOutcome, SecretString, ServiceType, SiteAdapter, SiteRegistry,
};

struct Harness {
    store: Arc<MemoryStore>,
    browser: Arc<MockBrowser>,
    launcher: Arc<MockLauncher>,
    mailer: Arc<MockMailer>,
    vault: Arc<CredentialVault>,
    run: RunConfig,
}

impl Harness {
    fn new(browser: MockBrowser, run: RunConfig) -> Self {
        let browser = Arc::new(browser);
        Self {
            store: Arc::new(MemoryStore::new()),
            launcher: Arc::new(MockLauncher::new(browser.clone())),
            browser,
            mailer: Arc::new(MockMailer::new()),
            vault: Arc::new(test_vault()),
            run,
        }
    }

    fn with_launcher(mut self, launcher: MockLauncher) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    fn runner(&self, site: MockSite) -> ImportRunner {
        self.runner_with(SiteRegistry::new().with(site))
    }

    fn runner_with(&self, sites: SiteRegistry) -> ImportRunner {
        ImportRunner::new(
            self.store.clone(),
            self.store.clone(),
            self.launcher.clone(),
            sites,
            self.vault.clone(),
            self.mailer.clone(),
            "ops@example.com",
            self.run.clone(),
        )
    }

    async fn schedule(&self, mut job: ImportJob) -> ImportJob {
        job.encrypted_password = self
            .vault
            .encrypt_str(&SecretString::new("hunter2"))
            .unwrap();
        self.store.insert_job(&job).await.unwrap();
        job
    }

    fn now_for(&self, job: &ImportJob) -> DateTime<Utc> {
        job.scheduled_at(self.run.schedule_offset).unwrap() + ChronoDuration::minutes(5)
    }
}

fn production() -> RunConfig {
    RunConfig::new(Environment::Production).with_runner_id("test-runner")
}

/// Browser serving `pages` as result pages 1..=n of `job`'s search URL.
fn browser_for(site: &MockSite, job: &ImportJob, pages: &[&[&str]]) -> MockBrowser {
    pages
        .iter()
        .enumerate()
        .fold(MockBrowser::new(), |browser, (i, companies)| {
            let url = site.page_url(&job.search_url, i + 1).unwrap();
            browser.with_page(url, listing_page_html(companies))
        })
}

#[tokio::test]
async fn test_full_run_persists_deduplicated_batch() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(
        &site,
        &template,
        &[&["Acme", "Beta", "Acme", "Gamma"], &["Beta", "Delta"]],
    );
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    let outcome = h.runner(site).run_due(h.now_for(&job)).await.unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(summary.items_scraped, 6);
    assert_eq!(summary.written.companies_created, 4);
    assert_eq!(summary.written.billing_addresses_created, 4);
    assert_eq!(summary.written.job_postings_created, 6);
    assert_eq!(summary.dedup.batch_matches, 2);

    assert_eq!(h.store.company_count(), 4);
    assert_eq!(h.store.reference_material_count(), 4);
    assert_eq!(h.store.job_posting_count(), 6);
    assert!(h.store.job(job.id).unwrap().succeeded);
    assert_eq!(h.browser.sessions_closed(), 1);
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_second_batch_reuses_persisted_companies() {
    let site = MockSite::new(ServiceType::SourceA);
    let first = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &first, &[&["Acme", "Beta"]]);
    let h = Harness::new(browser, production());

    let first = h.schedule(first).await;
    let mut second = sample_job(ServiceType::SourceA);
    second.agency_id = first.agency_id;
    second.start_hour = first.start_hour + 1;
    let second = h.schedule(second).await;

    h.runner(MockSite::new(ServiceType::SourceA))
        .run_due(h.now_for(&first))
        .await
        .unwrap();
    let outcome = h
        .runner(site)
        .run_due(h.now_for(&second))
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(summary.written.companies_created, 0);
    assert_eq!(summary.written.billing_addresses_created, 0);
    assert_eq!(summary.dedup.existing_companies, 2);
    assert_eq!(h.store.company_names(first.agency_id), vec!["Acme", "Beta"]);
    assert_eq!(h.store.job_posting_count(), 4);
}

#[tokio::test]
async fn test_other_agency_does_not_share_companies() {
    let site = MockSite::new(ServiceType::SourceA);
    let first = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &first, &[&["Acme"]]);
    let h = Harness::new(browser, production());

    let first = h.schedule(first).await;
    let mut second = sample_job(ServiceType::SourceA);
    second.start_hour = first.start_hour + 1;
    let second = h.schedule(second).await;

    h.runner(MockSite::new(ServiceType::SourceA))
        .run_due(h.now_for(&first))
        .await
        .unwrap();
    h.runner(site).run_due(h.now_for(&second)).await.unwrap();

    assert_eq!(h.store.company_count(), 2);
}

#[tokio::test]
async fn test_stops_after_max_count() {
    let site = MockSite::new(ServiceType::SourceA).with_page_size(4);
    let template = sample_job(ServiceType::SourceA);
    let page: &[&str] = &["A", "B", "C", "D"];
    let browser = browser_for(&site, &template, &[page, page, page, page]);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    h.runner(site).run_due(h.now_for(&job)).await.unwrap();

    assert_eq!(h.store.job_posting_count(), 10);
    assert_eq!(h.browser.result_page_visits(), 3);
}

#[tokio::test]
async fn test_debug_item_cap_outside_production() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let page: &[&str] = &["A", "B", "C", "D"];
    let browser = browser_for(&site, &template, &[page, page]);
    let run = RunConfig::new(Environment::Local)
        .with_debug_item_cap(Some(5))
        .with_runner_id("test-runner");
    let h = Harness::new(browser, run);
    let job = h.schedule(template).await;

    h.runner(site).run_due(h.now_for(&job)).await.unwrap();

    assert_eq!(h.store.job_posting_count(), 5);
}

#[tokio::test]
async fn test_source_enterprise_id_splits_same_name() {
    let site = MockSite::new(ServiceType::SourceB).with_dedup_on_source_enterprise_id(true);
    let template = sample_job(ServiceType::SourceB);
    let url = site.page_url(&template.search_url, 1).unwrap();
    let browser = MockBrowser::new().with_page(
        url,
        listing_page_html_with_ids(&[("Acme", 1), ("Acme", 2), ("Acme", 0), ("Acme", 1)]),
    );
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    h.runner(site).run_due(h.now_for(&job)).await.unwrap();

    assert_eq!(h.store.company_count(), 2);
    assert_eq!(h.store.job_posting_count(), 4);
}

#[tokio::test]
async fn test_panic_is_reported_and_nothing_persisted() {
    let site = MockSite::new(ServiceType::SourceA).with_panic_on_item(3);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &template, &[&["Acme", "Beta", "Gamma", "Delta"]]);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(matches!(err, ImportError::Panic { .. }));
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, FAILURE_SUBJECT);
    assert!(sent[0].body.contains(&job.id.to_string()));
    assert!(sent[0].body.contains("Stage: extracting"));
    assert!(sent[0].body.contains("mock extractor failed on item 3"));

    assert_eq!(h.store.company_count(), 0);
    assert_eq!(h.store.job_posting_count(), 0);
    let stored = h.store.job(job.id).unwrap();
    assert!(!stored.succeeded);
    assert_eq!(stored.claimed_by, None);
    assert_eq!(h.browser.sessions_closed(), 1);
}

#[tokio::test]
async fn test_timeout_is_reported_as_timeout() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let page: &[&str] = &["A", "B", "C", "D"];
    let browser = browser_for(&site, &template, &[page, page, page])
        .with_navigation_latency(Duration::from_millis(150));
    let run = production().with_run_timeout(Duration::from_millis(100));
    let h = Harness::new(browser, run);
    let job = h.schedule(template).await;

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(err.is_timeout());
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("timed out"));
    assert_eq!(h.store.job_posting_count(), 0);
    assert!(!h.store.job(job.id).unwrap().succeeded);
}

#[tokio::test]
async fn test_failure_mail_suppressed_outside_production() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = MockBrowser::new().with_login_outcomes(vec![false, false]);
    let h = Harness::new(
        browser,
        RunConfig::new(Environment::Staging).with_runner_id("test-runner"),
    );
    let job = h.schedule(template).await;

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(matches!(err, ImportError::Authentication { .. }));
    assert_eq!(h.mailer.attempts(), 0);
    assert_eq!(h.browser.login_submissions(), 2);
}

#[tokio::test]
async fn test_missing_browser_is_environment_error() {
    let site = MockSite::new(ServiceType::SourceA);
    let h = Harness::new(MockBrowser::new(), production());
    let launcher = MockLauncher::new(h.browser.clone()).missing_binary();
    let h = h.with_launcher(launcher);
    let job = h.schedule(sample_job(ServiceType::SourceA)).await;

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(matches!(err, ImportError::Environment(_)));
    assert_eq!(h.mailer.sent().len(), 1);
    assert!(h.mailer.sent()[0].body.contains("Stage: authenticating"));
}

#[tokio::test]
async fn test_commit_failure_writes_nothing() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &template, &[&["Acme", "Beta"]]);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;
    h.store.fail_commits(true);

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(matches!(err, ImportError::Persistence(_)));
    assert_eq!(h.store.company_count(), 0);
    assert!(!h.store.job(job.id).unwrap().succeeded);
    assert!(h.mailer.sent()[0].body.contains("Stage: persisting"));
}

#[tokio::test]
async fn test_job_leased_elsewhere_is_skipped() {
    let site = MockSite::new(ServiceType::SourceA);
    let h = Harness::new(MockBrowser::new(), production());
    let job = h.schedule(sample_job(ServiceType::SourceA)).await;
    let now = h.now_for(&job);
    assert!(h
        .store
        .claim(job.id, "other-runner", now, now + ChronoDuration::hours(1))
        .await
        .unwrap());

    let outcome = h.runner(site).run_due(now).await.unwrap();

    assert_eq!(outcome, RunOutcome::Idle);
    assert_eq!(h.launcher.launches(), 0);
}

#[tokio::test]
async fn test_job_without_adapter_is_skipped() {
    let h = Harness::new(MockBrowser::new(), production());
    let job = h.schedule(sample_job(ServiceType::SourceB)).await;

    let outcome = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(h.now_for(&job))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Idle);
    assert_eq!(h.launcher.launches(), 0);
}

#[tokio::test]
async fn test_nothing_due_outside_slot() {
    let h = Harness::new(MockBrowser::new(), production());
    let job = h.schedule(sample_job(ServiceType::SourceA)).await;

    let outcome = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(h.now_for(&job) + ChronoDuration::hours(1))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Idle);
}

#[tokio::test]
async fn test_rerun_in_same_hour_does_not_import_twice() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &template, &[&["Acme", "Beta"]]);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;
    let now = h.now_for(&job);

    h.runner(site).run_due(now).await.unwrap();
    let stored = h.store.job(job.id).unwrap();
    assert!(stored.succeeded);
    assert_eq!(stored.claimed_by, None);

    let again = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(now + ChronoDuration::minutes(10))
        .await
        .unwrap();

    assert_eq!(again, RunOutcome::Idle);
    assert_eq!(h.store.job_posting_count(), 2);
    assert_eq!(h.launcher.launches(), 1);
}

#[tokio::test]
async fn test_failed_commit_is_retried_once_in_same_hour() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &template, &[&["Acme", "Beta"]]);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;
    let now = h.now_for(&job);

    h.store.fail_commits(true);
    assert!(h.runner(site).run_due(now).await.is_err());
    h.store.fail_commits(false);

    let retry = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(now + ChronoDuration::minutes(10))
        .await
        .unwrap();
    assert!(matches!(retry, RunOutcome::Completed(_)));

    let third = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(now + ChronoDuration::minutes(20))
        .await
        .unwrap();
    assert_eq!(third, RunOutcome::Idle);
    assert_eq!(h.store.job_posting_count(), 2);
}

#[tokio::test]
async fn test_missing_company_aborts_whole_batch() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let url = site.page_url(&template.search_url, 1).unwrap();
    let page = r#"<html><body><div class="results">
        <div class="listing"><h2 class="title">Job 1</h2><p class="company">Acme</p></div>
        <div class="listing"><h2 class="title">Job 2</h2></div>
        <div class="listing"><h2 class="title">Job 3</h2><p class="company">Beta</p></div>
      </div></body></html>"#;
    let browser = MockBrowser::new().with_page(url, page);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    let err = h.runner(site).run_due(h.now_for(&job)).await.unwrap_err();

    assert!(matches!(err, ImportError::Extraction { ref field, .. } if field == "company_name"));
    assert_eq!(h.store.company_count(), 0);
    assert_eq!(h.store.job_posting_count(), 0);
    assert!(!h.store.job(job.id).unwrap().succeeded);
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Stage: extracting"));
}

const SOURCE_A_PAGE: &str = r#"<html><body><section class="search-results">
  <article class="job-card" data-job-id="A-1">
    <a class="job-card__link" href="https://agent.source-a.example/jobs/A-1">
      <h3 class="job-card__title">法人営業</h3>
    </a>
    <div class="job-card__company">株式会社アクメ</div>
    <dl class="job-card__spec">
      <div class="row"><dt>業種</dt><dd>IT・通信／金融</dd></div>
      <div class="row"><dt>職種</dt><dd>営業</dd></div>
      <div class="row"><dt>雇用形態</dt><dd>正社員</dd></div>
      <div class="row"><dt>勤務地</dt><dd>東京都港区、大阪府大阪市</dd></div>
      <div class="row"><dt>年収</dt><dd>400万円〜600万円</dd></div>
    </dl>
  </article>
  <article class="job-card" data-job-id="A-2">
    <h3 class="job-card__title">経理</h3>
    <div class="job-card__company">株式会社アクメ</div>
  </article>
</section></body></html>"#;

#[tokio::test]
async fn test_source_a_run_persists_facet_rows() {
    let adapter = SourceA::new();
    let template = sample_job(ServiceType::SourceA);
    let url = adapter.page_url(&template.search_url, 1).unwrap();
    let browser = MockBrowser::new()
        .with_button_label(adapter.config().submit_label.clone())
        .with_page(url, SOURCE_A_PAGE);
    let h = Harness::new(browser, production());
    let job = h.schedule(template).await;

    let outcome = h
        .runner_with(SiteRegistry::builtin_with_delay(Duration::ZERO))
        .run_due(h.now_for(&job))
        .await
        .unwrap();

    let RunOutcome::Completed(summary) = outcome else {
        panic!("expected a completed run, got {:?}", outcome);
    };
    assert_eq!(summary.items_scraped, 2);
    assert_eq!(h.store.company_names(job.agency_id), vec!["株式会社アクメ"]);
    assert_eq!(h.store.billing_address_count(), 1);
    assert_eq!(h.store.job_posting_count(), 2);
    assert_eq!(h.store.company_industry_count(), 2);
    assert_eq!(h.store.prefecture_count(), 2);
    assert_eq!(h.store.occupation_count(), 1);
    assert_eq!(h.store.employment_status_count(), 1);

    let postings = h.store.job_postings();
    assert_eq!(postings[0].external_source_id.as_deref(), Some("A-1"));
    assert_eq!(postings[0].salary_min, Some(4_000_000));
    assert_eq!(postings[1].salary_min, None);
    assert_eq!(h.browser.filled("input[name='password']").as_deref(), Some("hunter2"));
}

#[tokio::test]
async fn test_schedule_offset_picks_slot() {
    let site = MockSite::new(ServiceType::SourceA);
    let template = sample_job(ServiceType::SourceA);
    let browser = browser_for(&site, &template, &[&["Acme"]]);
    let utc = FixedOffset::east_opt(0).unwrap();
    let h = Harness::new(browser, production().with_schedule_offset(utc));
    let job = h.schedule(template).await;

    let jst_ten = FixedOffset::east_opt(9 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 1, 10, 5, 0)
        .unwrap()
        .with_timezone(&Utc);
    let idle = h
        .runner(MockSite::new(ServiceType::SourceA))
        .run_due(jst_ten)
        .await
        .unwrap();
    assert_eq!(idle, RunOutcome::Idle);

    let utc_ten = Utc.with_ymd_and_hms(2026, 3, 1, 10, 5, 0).unwrap();
    let outcome = h.runner(site).run_due(utc_ten).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert!(h.store.job(job.id).unwrap().succeeded);
}
