//! Outbound operator mail.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// A plain-text message for the operations mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait OperatorMailer: Send + Sync {
    async fn send(&self, message: &OperatorMessage) -> Result<()>;
}
