//! Credential storage and redaction.

pub mod credentials;
pub mod vault;

pub use credentials::{LoginCredentials, SecretString};
pub use vault::CredentialVault;
