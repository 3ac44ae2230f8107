//! Scheduled import requests.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AgencyId, ImportJobId, StaffId};

/// External platform a job imports from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "import_service_type", rename_all = "snake_case")
)]
pub enum ServiceType {
    SourceA,
    SourceB,
}

impl ServiceType {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::SourceA => "Source A",
            ServiceType::SourceB => "Source B",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::SourceA => write!(f, "source_a"),
            ServiceType::SourceB => write!(f, "source_b"),
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_a" => Ok(ServiceType::SourceA),
            "source_b" => Ok(ServiceType::SourceB),
            _ => Err(format!("Invalid service type: {}", s)),
        }
    }
}

/// A scheduled import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: ImportJobId,
    pub staff_id: StaffId,
    /// Agency of the staff member; scopes deduplication
    pub agency_id: AgencyId,
    pub service_type: ServiceType,
    pub login_id: String,
    /// Vault output, base64(nonce || ciphertext)
    pub encrypted_password: String,
    /// Local (schedule timezone) date
    pub start_date: NaiveDate,
    /// Local hour, 0..=23
    pub start_hour: u8,
    pub max_count: usize,
    pub offset: usize,
    pub search_url: String,
    pub succeeded: bool,

    // Lease taken by the runner that picked the job up
    pub claimed_by: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ImportJob {
    /// Due when `now`, in the schedule timezone, falls in the job's start hour.
    pub fn is_due(&self, now: DateTime<Utc>, tz: FixedOffset) -> bool {
        let local = now.with_timezone(&tz);
        !self.succeeded
            && local.date_naive() == self.start_date
            && local.hour() == u32::from(self.start_hour)
    }

    /// Whether another runner holds an unexpired lease.
    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        matches!(self.claimed_until, Some(until) if until > now)
    }

    /// Scheduled start as a UTC instant.
    pub fn scheduled_at(&self, tz: FixedOffset) -> Option<DateTime<Utc>> {
        self.start_date
            .and_hms_opt(u32::from(self.start_hour), 0, 0)?
            .and_local_timezone(tz)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Admin input for scheduling a job. The password is plaintext here and is
/// encrypted before it reaches the store.
#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub staff_id: StaffId,
    pub agency_id: AgencyId,
    pub service_type: ServiceType,
    pub login_id: String,
    pub password: crate::security::SecretString,
    pub start_date: NaiveDate,
    pub start_hour: u8,
    pub max_count: usize,
    pub offset: usize,
    pub search_url: String,
}
