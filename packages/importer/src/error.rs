//! Typed errors for the import pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the runner can
//! classify failures before reporting them.

use thiserror::Error;

/// Errors that can end an import run.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Host environment is unusable (no browser binary, bad selector config)
    #[error("environment error: {0}")]
    Environment(String),

    /// Still on the login page after the retry
    #[error("authentication failed for {login_id} on {service}")]
    Authentication { service: String, login_id: String },

    /// Required field or structural selector missing
    #[error("extraction failed: {field} missing ({context})")]
    Extraction { field: String, context: String },

    /// Storage operation failed
    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The run exceeded its deadline
    #[error("deadline exceeded after {seconds}s")]
    Timeout { seconds: u64 },

    /// Credential vault failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Another job already occupies the schedule slot
    #[error("conflict: {0}")]
    Conflict(String),

    /// A panic was caught at the recovery boundary
    #[error("panic: {message}")]
    Panic { message: String, trace: String },

    /// Browser automation failed (navigation, element lookup)
    #[error("browser error: {0}")]
    Browser(String),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),
}

impl ImportError {
    /// Build an extraction error for a missing required field.
    pub fn missing(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Extraction {
            field: field.into(),
            context: context.into(),
        }
    }

    /// Wrap any storage failure.
    pub fn persistence(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Persistence(err.into())
    }

    /// Whether operator messages should use the timeout wording.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Panic { message, .. } => message.contains("deadline"),
            _ => false,
        }
    }

    /// Short machine-readable kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Environment(_) => "environment",
            Self::Authentication { .. } => "authentication",
            Self::Extraction { .. } => "extraction",
            Self::Persistence(_) => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::Crypto(_) => "crypto",
            Self::Conflict(_) => "conflict",
            Self::Panic { .. } if self.is_timeout() => "timeout",
            Self::Panic { .. } => "panic",
            Self::Browser(_) => "browser",
            Self::Config(_) => "config",
        }
    }
}

/// Credential vault errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key was not 32 bytes of valid base64
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Ciphertext was not valid base64
    #[error("invalid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Ciphertext shorter than a nonce
    #[error("ciphertext too short: {len} bytes")]
    TooShort { len: usize },

    /// AEAD seal failed
    #[error("encryption failed")]
    Encrypt,

    /// AEAD verification failed (tampered data or wrong key)
    #[error("decryption failed")]
    Decrypt,

    /// Decrypted bytes were not UTF-8
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;

/// Result type alias for vault operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_panic_is_timeout() {
        let err = ImportError::Panic {
            message: "context deadline exceeded".into(),
            trace: String::new(),
        };
        assert!(err.is_timeout());
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_plain_panic_is_not_timeout() {
        let err = ImportError::Panic {
            message: "index out of bounds".into(),
            trace: String::new(),
        };
        assert!(!err.is_timeout());
        assert_eq!(err.kind(), "panic");
    }
}
