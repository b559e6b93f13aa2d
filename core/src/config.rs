//! Client configuration.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{VaultError, VaultResult};

pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Server address, token and transport settings.
///
/// The token is kept in a `SecretString` so it never shows up in `Debug`
/// output.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Base address, e.g. `http://127.0.0.1:8200`.
    pub address: String,
    pub token: SecretString,
    /// Overall per-request timeout. `None` leaves the transport default.
    pub timeout: Option<Duration>,
}

impl VaultConfig {
    #[must_use]
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: SecretString::from(token.into()),
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_CLIENT_TIMEOUT` (seconds).
    pub fn from_env() -> VaultResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> VaultResult<Self> {
        let address = lookup("VAULT_ADDR")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let token = lookup("VAULT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| VaultError::invalid_argument("VAULT_TOKEN is not set"))?;

        let mut config = Self::new(address, token);
        if let Some(raw) = lookup("VAULT_CLIENT_TIMEOUT") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                VaultError::invalid_argument(format!("VAULT_CLIENT_TIMEOUT is not a number: {raw}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }
}
