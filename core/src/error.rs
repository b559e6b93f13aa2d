//! Error types for the Vault client.
//!
//! # Design
//! `Service` is the only error that originates from the server: any status
//! outside an endpoint's success set lands there together with the decoded
//! `errors` list. `InvalidArgument` is raised locally before a request is
//! built. The remaining variants cover the round-trip and the JSON codec.

use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The server answered with a status outside the expected success set.
    #[error("vault returned status {status}: [{}]", .messages.join(", "))]
    Service { status: u16, messages: Vec<String> },

    /// A local precondition failed; no request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The HTTP round-trip itself failed (connect, TLS, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A success response body did not match the expected envelope.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl VaultError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Status code of a `Service` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Messages of a `Service` error, empty for every other variant.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Service { messages, .. } => messages,
            _ => &[],
        }
    }

    pub fn is_service_status(&self, code: u16) -> bool {
        self.status() == Some(code)
    }
}
