//! Run configuration.
//!
//! `RunConfig` is decided once by the caller and passed into the runner;
//! pipeline code never reads the environment directly. `ImporterConfig`
//! loads everything the `run_imports` binary needs from env vars.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::security::SecretString;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Local,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stg" => Ok(Environment::Staging),
            "local" | "development" | "dev" => Ok(Environment::Local),
            _ => Err(anyhow::anyhow!("Invalid environment: {}", s)),
        }
    }
}

/// Per-run behavior toggles.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub environment: Environment,

    /// Outside production, stop after this many items. Ignored in production.
    pub debug_item_cap: Option<usize>,

    /// Launch the browser without a window
    pub headless: bool,

    /// Explicit browser binary; otherwise searched on `PATH`
    pub browser_path: Option<PathBuf>,

    /// Bound on the whole run, browser launch through the last write
    pub run_timeout: Duration,

    /// Timezone that job start dates/hours are expressed in
    pub schedule_offset: FixedOffset,

    /// How long a claimed job stays leased to this runner
    pub lease: Duration,

    /// Identifies this runner in job leases
    pub runner_id: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            debug_item_cap: Some(5),
            headless: true,
            browser_path: None,
            run_timeout: Duration::from_secs(60 * 60),
            schedule_offset: FixedOffset::east_opt(9 * 3600).expect("valid offset"),
            lease: Duration::from_secs(2 * 60 * 60),
            runner_id: format!("importer-{}", std::process::id()),
        }
    }
}

impl RunConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Default::default()
        }
    }

    pub fn with_debug_item_cap(mut self, cap: Option<usize>) -> Self {
        self.debug_item_cap = cap;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_schedule_offset(mut self, offset: FixedOffset) -> Self {
        self.schedule_offset = offset;
        self
    }

    pub fn with_runner_id(mut self, runner_id: impl Into<String>) -> Self {
        self.runner_id = runner_id.into();
        self
    }

    /// The cap that actually applies in this environment.
    pub fn effective_item_cap(&self) -> Option<usize> {
        if self.environment.is_production() {
            None
        } else {
            self.debug_item_cap
        }
    }
}

/// Importer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub database_url: String,
    /// Base64 32-byte key for the credential vault
    pub credential_key: SecretString,
    pub mail_api_url: Option<String>,
    pub mail_api_token: Option<SecretString>,
    pub mail_from: String,
    pub operator_email: String,
    /// Overrides every site's navigation delay when set
    pub navigation_delay: Option<Duration>,
    pub run: RunConfig,
}

impl ImporterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let environment: Environment = env::var("IMPORTER_ENV")
            .unwrap_or_else(|_| "local".to_string())
            .parse()
            .context("IMPORTER_ENV must be production, staging or local")?;

        let mut run = RunConfig::new(environment);

        if let Ok(cap) = env::var("IMPORT_DEBUG_ITEM_CAP") {
            run.debug_item_cap = match cap.as_str() {
                "" | "none" => None,
                n => Some(n.parse().context("IMPORT_DEBUG_ITEM_CAP must be a number")?),
            };
        }
        if let Ok(headless) = env::var("IMPORT_HEADLESS") {
            run.headless = headless
                .parse()
                .context("IMPORT_HEADLESS must be true or false")?;
        }
        run.browser_path = env::var("CHROME_PATH").ok().map(PathBuf::from);
        if let Ok(secs) = env::var("IMPORT_RUN_TIMEOUT_SECS") {
            run.run_timeout = Duration::from_secs(
                secs.parse()
                    .context("IMPORT_RUN_TIMEOUT_SECS must be a number")?,
            );
        }
        if let Ok(hours) = env::var("IMPORT_SCHEDULE_UTC_OFFSET_HOURS") {
            let hours: i32 = hours
                .parse()
                .context("IMPORT_SCHEDULE_UTC_OFFSET_HOURS must be a number")?;
            run.schedule_offset = FixedOffset::east_opt(hours * 3600)
                .context("IMPORT_SCHEDULE_UTC_OFFSET_HOURS out of range")?;
        }
        if let Ok(runner_id) = env::var("IMPORT_RUNNER_ID") {
            run.runner_id = runner_id;
        }

        let navigation_delay = match env::var("IMPORT_NAVIGATION_DELAY_MS") {
            Ok(ms) => Some(Duration::from_millis(
                ms.parse()
                    .context("IMPORT_NAVIGATION_DELAY_MS must be a number")?,
            )),
            Err(_) => None,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            credential_key: env::var("CREDENTIAL_KEY")
                .context("CREDENTIAL_KEY must be set")?
                .into(),
            mail_api_url: env::var("MAIL_API_URL").ok(),
            mail_api_token: env::var("MAIL_API_TOKEN").ok().map(SecretString::from),
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "importer@localhost".to_string()),
            operator_email: env::var("OPERATOR_EMAIL")
                .unwrap_or_else(|_| "import-alerts@localhost".to_string()),
            navigation_delay,
            run,
        })
    }
}
