//! Operator notification for failed runs.

use chrono::FixedOffset;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::stage::RunStage;
use crate::config::Environment;
use crate::error::ImportError;
use crate::traits::mailer::{OperatorMailer, OperatorMessage};
use crate::types::job::ImportJob;

pub const FAILURE_SUBJECT: &str = "Import processing error notification";

/// Compose the operator message for a failed job.
pub fn failure_message(
    to: &str,
    job: &ImportJob,
    stage: RunStage,
    err: &ImportError,
    tz: FixedOffset,
) -> OperatorMessage {
    let scheduled = job
        .scheduled_at(tz)
        .map(|at| {
            at.with_timezone(&tz)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|| format!("{} {:02}:00", job.start_date, job.start_hour));

    let mut body = String::new();
    if err.is_timeout() {
        body.push_str("The import run timed out before it finished.\n\n");
    } else {
        body.push_str("The import run failed with an error.\n\n");
    }
    let _ = writeln!(body, "Job ID: {}", job.id);
    let _ = writeln!(body, "Source: {}", job.service_type.label());
    let _ = writeln!(body, "Scheduled at: {}", scheduled);
    let _ = writeln!(body, "Offset: {}", job.offset);
    let _ = writeln!(body, "Max count: {}", job.max_count);
    let _ = writeln!(body, "Stage: {}", stage);
    let _ = writeln!(body, "Error kind: {}", err.kind());
    let _ = writeln!(body, "Error: {}", err);
    if let ImportError::Panic { trace, .. } = err {
        if !trace.is_empty() {
            let _ = writeln!(body, "\nStack trace:\n{}", trace);
        }
    }

    OperatorMessage {
        to: to.to_string(),
        subject: FAILURE_SUBJECT.to_string(),
        body,
    }
}

/// Sends failure mail in production and logs it elsewhere.
#[derive(Clone)]
pub struct FailureReporter {
    mailer: Arc<dyn OperatorMailer>,
    to: String,
    environment: Environment,
    tz: FixedOffset,
}

impl FailureReporter {
    pub fn new(
        mailer: Arc<dyn OperatorMailer>,
        to: impl Into<String>,
        environment: Environment,
        tz: FixedOffset,
    ) -> Self {
        Self {
            mailer,
            to: to.into(),
            environment,
            tz,
        }
    }

    /// Report a failure. Never fails; a mail error is only logged.
    pub async fn report(&self, job: &ImportJob, stage: RunStage, err: &ImportError) {
        let message = failure_message(&self.to, job, stage, err, self.tz);

        if !self.environment.is_production() {
            warn!(
                job_id = %job.id,
                environment = ?self.environment,
                subject = %message.subject,
                "Failure mail suppressed outside production:\n{}",
                message.body
            );
            return;
        }

        match self.mailer.send(&message).await {
            Ok(()) => info!(job_id = %job.id, to = %self.to, "Failure mail sent"),
            Err(mail_err) => error!(
                job_id = %job.id,
                error = %mail_err,
                original_error = %err,
                "Failed to send failure mail"
            ),
        }
    }
}
