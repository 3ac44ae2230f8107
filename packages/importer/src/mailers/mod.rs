//! Operator mail implementations.
//!
//! - `HttpMailer` - posts to a mail API
//! - `LogMailer` - writes the message to the log (no mail API configured)

pub mod http;

use async_trait::async_trait;
use tracing::warn;

pub use http::HttpMailer;

use crate::error::Result;
use crate::traits::mailer::{OperatorMailer, OperatorMessage};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl OperatorMailer for LogMailer {
    async fn send(&self, message: &OperatorMessage) -> Result<()> {
        warn!(
            to = %message.to,
            subject = %message.subject,
            "No mail API configured, operator message follows:\n{}",
            message.body
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_mailer_always_succeeds() {
        let message = OperatorMessage {
            to: "ops@example.com".into(),
            subject: "subject".into(),
            body: "body".into(),
        };
        tokio_test::assert_ok!(tokio_test::block_on(LogMailer.send(&message)));
    }
}
