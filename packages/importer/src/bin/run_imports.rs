//! Import Trigger
//!
//! Runs the first due import job once and exits. Meant to be invoked by
//! cron at the top of every hour.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use importer::{
    ChromeLauncher, CredentialVault, HttpMailer, ImportRunner, ImporterConfig, LogMailer,
    OperatorMailer, PostgresStore, RunOutcome, SiteRegistry,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,importer=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let config = ImporterConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        environment = ?config.run.environment,
        runner_id = %config.run.runner_id,
        "Starting import trigger"
    );

    // Database setup
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let store = Arc::new(
        PostgresStore::from_pool(pool)
            .await
            .context("Failed to prepare import schema")?,
    );

    let vault = CredentialVault::from_base64_key(&config.credential_key)
        .context("CREDENTIAL_KEY must be base64 of 32 bytes")?;

    let mailer: Arc<dyn OperatorMailer> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailer::new(
            url.clone(),
            config.mail_from.clone(),
            config.mail_api_token.clone(),
        )),
        None => {
            tracing::warn!("MAIL_API_URL not set, operator mail goes to the log");
            Arc::new(LogMailer)
        }
    };

    let sites = match config.navigation_delay {
        Some(delay) => SiteRegistry::builtin_with_delay(delay),
        None => SiteRegistry::builtin(),
    };

    let runner = ImportRunner::new(
        store.clone(),
        store,
        Arc::new(ChromeLauncher::new()),
        sites,
        Arc::new(vault),
        mailer,
        config.operator_email.clone(),
        config.run.clone(),
    );

    match runner.run_due(Utc::now()).await.context("Import run failed")? {
        RunOutcome::Idle => tracing::info!("No import due"),
        RunOutcome::Completed(summary) => tracing::info!(
            job_id = %summary.job_id,
            service = %summary.service,
            items = summary.items_scraped,
            postings = summary.written.job_postings_created,
            "Import complete"
        ),
    }

    Ok(())
}
