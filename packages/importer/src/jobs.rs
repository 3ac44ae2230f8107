//! Scheduling import jobs.

use chrono::Utc;
use tracing::info;
use url::Url;

use crate::error::{ImportError, Result};
use crate::security::CredentialVault;
use crate::traits::store::ImportJobStore;
use crate::types::ids::ImportJobId;
use crate::types::job::{ImportJob, NewImportJob};

/// Encrypt the password and store a new job.
///
/// Fails with `ImportError::Conflict` when the `(start_date, start_hour)`
/// slot is taken.
pub async fn schedule_import(
    store: &dyn ImportJobStore,
    vault: &CredentialVault,
    input: NewImportJob,
) -> Result<ImportJob> {
    if input.start_hour > 23 {
        return Err(ImportError::Config(format!(
            "start_hour must be 0..=23, got {}",
            input.start_hour
        )));
    }
    if input.max_count == 0 {
        return Err(ImportError::Config("max_count must be positive".into()));
    }
    Url::parse(&input.search_url)
        .map_err(|e| ImportError::Config(format!("invalid search URL {}: {}", input.search_url, e)))?;

    let job = ImportJob {
        id: ImportJobId::new(),
        staff_id: input.staff_id,
        agency_id: input.agency_id,
        service_type: input.service_type,
        login_id: input.login_id,
        encrypted_password: vault.encrypt_str(&input.password)?,
        start_date: input.start_date,
        start_hour: input.start_hour,
        max_count: input.max_count,
        offset: input.offset,
        search_url: input.search_url,
        succeeded: false,
        claimed_by: None,
        claimed_until: None,
        created_at: Utc::now(),
    };

    store.insert_job(&job).await?;

    info!(
        job_id = %job.id,
        service = %job.service_type,
        start_date = %job.start_date,
        start_hour = job.start_hour,
        "Import scheduled"
    );
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{new_job_input, test_vault};
    use crate::types::job::ServiceType;

    #[tokio::test]
    async fn test_password_is_encrypted() {
        let store = MemoryStore::new();
        let vault = test_vault();

        let job = schedule_import(&store, &vault, new_job_input(ServiceType::SourceA, 10))
            .await
            .unwrap();

        assert!(!job.encrypted_password.contains("hunter2"));
        assert_eq!(vault.decrypt_str(&job.encrypted_password).unwrap().expose(), "hunter2");
        assert!(store.job(job.id).is_some());
    }

    #[tokio::test]
    async fn test_duplicate_slot_conflicts() {
        let store = MemoryStore::new();
        let vault = test_vault();

        schedule_import(&store, &vault, new_job_input(ServiceType::SourceA, 10))
            .await
            .unwrap();
        let err = schedule_import(&store, &vault, new_job_input(ServiceType::SourceB, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rejects_bad_hour() {
        let store = MemoryStore::new();
        let err = schedule_import(&store, &test_vault(), new_job_input(ServiceType::SourceA, 24))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }
}
