use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{ImportError, Result};
use crate::security::SecretString;
use crate::traits::mailer::{OperatorMailer, OperatorMessage};

/// Mail API client
/// Posts operator messages as JSON to a transactional mail endpoint
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    from: String,
    api_token: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, from: impl Into<String>, api_token: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            from: from.into(),
            api_token,
        }
    }
}

#[async_trait]
impl OperatorMailer for HttpMailer {
    async fn send(&self, message: &OperatorMessage) -> Result<()> {
        let payload = MailRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token.expose()));
        }

        info!(to = %message.to, subject = %message.subject, "Sending operator mail");

        let response = request
            .send()
            .await
            .map_err(|e| ImportError::Environment(format!("mail API unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Mail API failed {}: {}", status, body);
            return Err(ImportError::Environment(format!(
                "mail API error {}: {}",
                status, body
            )));
        }

        let receipt: serde_json::Value = response.json().await.unwrap_or_default();
        info!(receipt = %receipt, "Operator mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let payload = MailRequest {
            from: "importer@example.com",
            to: "ops@example.com",
            subject: "Import processing error notification",
            text: "body",
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["to"], "ops@example.com");
        assert_eq!(value["text"], "body");
        assert_eq!(value.as_object().unwrap().len(), 4);
    }
}
