//! Synchronous client for a Vault-style secrets service.
//!
//! # Overview
//! Covers transit key lifecycle (create, read, configure, rotate, delete),
//! transit encrypt/decrypt, generic secret paths, seal status and token
//! lookup/creation. Every call is a single authenticated HTTP round-trip.
//!
//! # Design
//! - `VaultClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network.
//! - `Transport` executes one request; `UreqTransport` is the blocking
//!   implementation.
//! - `VaultManager` glues the two together and is what most callers use.
//! - Any status outside an endpoint's success set becomes
//!   `VaultError::Service` with the server's `errors` list.
//!
//! ```no_run
//! use vault_core::{VaultConfig, VaultManager};
//!
//! let vault = VaultManager::new(&VaultConfig::new("http://127.0.0.1:8200", "root"));
//! vault.create_key("orders")?;
//! let ciphertext = vault.encrypt("orders", "aGVsbG8gd29ybGQ=")?;
//! assert_eq!(vault.decrypt("orders", &ciphertext)?, "aGVsbG8gd29ybGQ=");
//! # Ok::<(), vault_core::VaultError>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod transport;
pub mod types;

pub use client::VaultClient;
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TOKEN_HEADER};
pub use manager::VaultManager;
pub use transport::{Transport, UreqTransport};
pub use types::{
    CreateKeyRequest, DecryptResponse, EncryptResponse, KeyConfig, KeyMetadata, SealStatus,
    SecretResponse, TokenAuth, TokenCreateRequest, TokenCreateRequestBuilder, TokenInfo,
    TokenResponse,
};
