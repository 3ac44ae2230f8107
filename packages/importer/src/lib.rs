//! External Listing Importer
//!
//! Scheduled import of job listings from third-party recruiting platforms.
//! A run logs into the platform with a headless browser, walks the search
//! results, extracts each listing into the platform's schema, deduplicates
//! companies against the batch and the store, and writes everything in one
//! transaction.
//!
//! # Usage
//!
//! ```rust,ignore
//! use importer::{ImportRunner, MemoryStore, SiteRegistry, ChromeLauncher, LogMailer, RunConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let runner = ImportRunner::new(
//!     store.clone(),
//!     store,
//!     Arc::new(ChromeLauncher::new()),
//!     SiteRegistry::builtin(),
//!     Arc::new(vault),
//!     Arc::new(LogMailer),
//!     "ops@example.com",
//!     RunConfig::new(Environment::Local),
//! );
//! let outcome = runner.run_due(Utc::now()).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Seams: browser, site adapter, stores, operator mail
//! - [`types`] - Jobs, listings, coded enums, persisted entities
//! - [`browser`] - Headless Chrome and login
//! - [`crawler`] - Result page pagination
//! - [`sites`] - Site adapters and HTML field extraction
//! - [`pipeline`] - Dedup, persistence, failure reporting, the runner
//! - [`stores`] - Storage implementations (MemoryStore, PostgresStore)
//! - [`security`] - Credential vault and redacted secrets
//! - [`testing`] - Mock implementations for testing

pub mod browser;
pub mod config;
pub mod crawler;
pub mod error;
pub mod jobs;
pub mod mailers;
pub mod normalize;
pub mod pipeline;
pub mod security;
pub mod sites;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::{Environment, ImporterConfig, RunConfig};
pub use error::{CryptoError, ImportError, Result};
pub use traits::{
    browser::{BrowserLauncher, BrowserPage},
    mailer::{OperatorMailer, OperatorMessage},
    site::{SiteAdapter, SiteConfig},
    store::{EnterpriseStore, ImportJobStore},
};
pub use types::{
    entities::{WritePlan, WriteSummary},
    ids::{AgencyId, BillingAddressId, CompanyId, ImportJobId, StaffId},
    job::{ImportJob, NewImportJob, ServiceType},
    listing::{ExternalListing, RawItem, Resolved},
};

pub use browser::ChromeLauncher;
pub use jobs::schedule_import;
pub use mailers::{HttpMailer, LogMailer};
pub use pipeline::{ImportRunner, RunOutcome, RunStage, RunSummary};
pub use security::{CredentialVault, LoginCredentials, SecretString};
pub use sites::SiteRegistry;
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
