//! Request and response payloads of the Vault HTTP API.
//!
//! # Design
//! Response types ignore unknown fields (serde's default) and give every
//! field the service may omit a `#[serde(default)]`, so additive changes on
//! the server side never break decoding. Request types skip absent optional
//! fields instead of sending `null`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error document returned with any non-success status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Generic secret read from an arbitrary path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretResponse {
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Transit keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeyRequest {
    pub derived: bool,
}

/// Mutable key settings; only the fields that are set get sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_decryption_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_encryption_version: Option<u32>,
}

impl KeyConfig {
    pub fn allow_deletion() -> Self {
        Self {
            deletion_allowed: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitKeyResponse {
    pub data: KeyMetadata,
}

/// Metadata of a named transit key.
///
/// Older servers report the cipher as `cipher_mode`, newer ones as `type`;
/// some send both. Use [`KeyMetadata::cipher`] to read whichever is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_mode: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default)]
    pub deletion_allowed: bool,
    #[serde(default)]
    pub derived: bool,
    #[serde(default)]
    pub exportable: bool,
    #[serde(default)]
    pub latest_version: Option<u32>,
    #[serde(default)]
    pub min_decryption_version: Option<u32>,
    #[serde(default)]
    pub min_encryption_version: Option<u32>,
    /// Version number (as a string key) to creation info. The value is a
    /// unix timestamp on most servers and an object for asymmetric keys.
    #[serde(default)]
    pub keys: BTreeMap<String, Value>,
}

impl KeyMetadata {
    /// Cipher of the key, preferring `type` over the legacy `cipher_mode`.
    pub fn cipher(&self) -> Option<&str> {
        self.key_type.as_deref().or(self.cipher_mode.as_deref())
    }

    /// Numeric key versions in ascending order; non-numeric entries are skipped.
    pub fn versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.keys.keys().filter_map(|v| v.parse().ok()).collect();
        versions.sort_unstable();
        versions
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub plaintext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    pub ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub data: EncryptData,
    #[serde(default)]
    pub lease_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptData {
    pub ciphertext: String,
    #[serde(default)]
    pub key_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub data: DecryptData,
    #[serde(default)]
    pub lease_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptData {
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Seal state of the server: threshold `t` of `n` key shares, with
/// `progress` shares submitted so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealStatus {
    pub sealed: bool,
    pub t: u32,
    pub n: u32,
    pub progress: u32,
    #[serde(default)]
    pub initialized: Option<bool>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Envelope for token lookup (`data`) and token creation (`auth`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub data: Option<TokenInfo>,
    #[serde(default)]
    pub auth: Option<TokenAuth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub creation_ttl: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub num_uses: u32,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub meta: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenAuth {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Parameters for `auth/token/create`. Build with [`TokenCreateRequest::builder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_parent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_default_policy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewable: Option<bool>,
}

impl TokenCreateRequest {
    pub fn builder() -> TokenCreateRequestBuilder {
        TokenCreateRequestBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenCreateRequestBuilder {
    inner: TokenCreateRequest,
}

impl TokenCreateRequestBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.inner.id = Some(id.into());
        self
    }

    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.inner.policies.push(policy.into());
        self
    }

    pub fn policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.policies.extend(policies.into_iter().map(Into::into));
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .meta
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn no_parent(mut self, no_parent: bool) -> Self {
        self.inner.no_parent = Some(no_parent);
        self
    }

    pub fn no_default_policy(mut self, no_default_policy: bool) -> Self {
        self.inner.no_default_policy = Some(no_default_policy);
        self
    }

    /// Duration string understood by the server, e.g. `"30m"` or `"1h"`.
    pub fn ttl(mut self, ttl: impl Into<String>) -> Self {
        self.inner.ttl = Some(ttl.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.inner.display_name = Some(name.into());
        self
    }

    pub fn num_uses(mut self, num_uses: u32) -> Self {
        self.inner.num_uses = Some(num_uses);
        self
    }

    pub fn renewable(mut self, renewable: bool) -> Self {
        self.inner.renewable = Some(renewable);
        self
    }

    pub fn build(self) -> TokenCreateRequest {
        self.inner
    }
}
