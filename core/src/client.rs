//! Stateless request builder and response parser for the Vault HTTP API.
//!
//! # Design
//! `VaultClient` holds only the base address and the token. Every endpoint is
//! split into a `build_*` method that produces an `HttpRequest` and a
//! `parse_*` method that consumes an `HttpResponse`. The round-trip between
//! the two is performed by a `Transport` (see `VaultManager`), which keeps
//! this module deterministic and free of I/O.

use std::borrow::Cow;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, TOKEN_HEADER};
use crate::types::{
    CreateKeyRequest, DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse,
    ErrorResponse, KeyConfig, KeyMetadata, SealStatus, SecretResponse, TokenCreateRequest,
    TokenResponse, TransitKeyResponse,
};

/// Success set of the secret and transit endpoints.
const OK_OR_NO_CONTENT: &[u16] = &[200, 204];
/// Success set of the `sys/` and `auth/` endpoints.
const OK_ONLY: &[u16] = &[200];

/// Synchronous, stateless client for the Vault HTTP API.
#[derive(Debug, Clone)]
pub struct VaultClient {
    base_url: String,
    token: SecretString,
}

impl VaultClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: SecretString::from(token.into()),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(&config.address, config.token())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Generic secret paths
    // -----------------------------------------------------------------------

    pub fn build_read(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &secret_path(path), None)
    }

    /// `None` when the server answers 204 or with an empty body.
    pub fn parse_read(&self, response: HttpResponse) -> VaultResult<Option<SecretResponse>> {
        check_status(&response, OK_OR_NO_CONTENT)?;
        if response.status == 204 || response.body.trim().is_empty() {
            return Ok(None);
        }
        decode(&response).map(Some)
    }

    pub fn build_write<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> VaultResult<HttpRequest> {
        let body = encode(body)?;
        Ok(self.request(HttpMethod::Post, &secret_path(path), Some(body)))
    }

    pub fn parse_write(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    pub fn build_delete(&self, path: &str) -> HttpRequest {
        self.request(HttpMethod::Delete, &secret_path(path), None)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    // -----------------------------------------------------------------------
    // Transit keys
    // -----------------------------------------------------------------------

    pub fn build_create_key(&self, name: &str, input: &CreateKeyRequest) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        let body = encode(input)?;
        Ok(self.request(HttpMethod::Post, &format!("transit/keys/{}", segment(name)), Some(body)))
    }

    pub fn parse_create_key(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    pub fn build_get_key(&self, name: &str) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        Ok(self.request(HttpMethod::Get, &format!("transit/keys/{}", segment(name)), None))
    }

    pub fn parse_get_key(&self, response: HttpResponse) -> VaultResult<KeyMetadata> {
        check_status(&response, OK_OR_NO_CONTENT)?;
        decode::<TransitKeyResponse>(&response).map(|r| r.data)
    }

    pub fn build_update_key_config(&self, name: &str, config: &KeyConfig) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        let body = encode(config)?;
        Ok(self.request(HttpMethod::Post, &format!("transit/keys/{}/config", segment(name)), Some(body)))
    }

    pub fn parse_update_key_config(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    pub fn build_rotate_key(&self, name: &str) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        Ok(self.request(HttpMethod::Post, &format!("transit/keys/{}/rotate", segment(name)), None))
    }

    pub fn parse_rotate_key(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    /// Deletes the key itself. The server refuses unless `deletion_allowed`
    /// was set through `build_update_key_config` first.
    pub fn build_delete_key(&self, name: &str) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        Ok(self.request(HttpMethod::Delete, &format!("transit/keys/{}", segment(name)), None))
    }

    pub fn parse_delete_key(&self, response: HttpResponse) -> VaultResult<()> {
        check_status(&response, OK_OR_NO_CONTENT)
    }

    // -----------------------------------------------------------------------
    // Encrypt / decrypt
    // -----------------------------------------------------------------------

    /// `plaintext` must already be base64 encoded and must not be empty.
    pub fn build_encrypt(
        &self,
        name: &str,
        plaintext: &str,
        context: Option<&str>,
    ) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        if plaintext.is_empty() {
            return Err(VaultError::invalid_argument("plaintext must not be empty"));
        }
        let body = encode(&EncryptRequest {
            plaintext: plaintext.to_string(),
            context: context.map(str::to_string),
        })?;
        Ok(self.request(HttpMethod::Post, &format!("transit/encrypt/{}", segment(name)), Some(body)))
    }

    pub fn parse_encrypt(&self, response: HttpResponse) -> VaultResult<EncryptResponse> {
        check_status(&response, OK_OR_NO_CONTENT)?;
        decode(&response)
    }

    pub fn build_decrypt(
        &self,
        name: &str,
        ciphertext: &str,
        context: Option<&str>,
    ) -> VaultResult<HttpRequest> {
        require_key_name(name)?;
        if ciphertext.is_empty() {
            return Err(VaultError::invalid_argument("ciphertext must not be empty"));
        }
        let body = encode(&DecryptRequest {
            ciphertext: ciphertext.to_string(),
            context: context.map(str::to_string),
        })?;
        Ok(self.request(HttpMethod::Post, &format!("transit/decrypt/{}", segment(name)), Some(body)))
    }

    pub fn parse_decrypt(&self, response: HttpResponse) -> VaultResult<DecryptResponse> {
        check_status(&response, OK_OR_NO_CONTENT)?;
        decode(&response)
    }

    // -----------------------------------------------------------------------
    // System and tokens
    // -----------------------------------------------------------------------

    pub fn build_seal_status(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "sys/seal-status", None)
    }

    pub fn parse_seal_status(&self, response: HttpResponse) -> VaultResult<SealStatus> {
        check_status(&response, OK_ONLY)?;
        decode(&response)
    }

    pub fn build_lookup_token(&self, token: &str) -> VaultResult<HttpRequest> {
        if token.is_empty() {
            return Err(VaultError::invalid_argument("token must not be empty"));
        }
        Ok(self.request(HttpMethod::Get, &format!("auth/token/lookup/{}", segment(token)), None))
    }

    pub fn parse_lookup_token(&self, response: HttpResponse) -> VaultResult<TokenResponse> {
        check_status(&response, OK_ONLY)?;
        decode(&response)
    }

    pub fn build_create_token(&self, input: &TokenCreateRequest) -> VaultResult<HttpRequest> {
        let body = encode(input)?;
        Ok(self.request(HttpMethod::Post, "auth/token/create", Some(body)))
    }

    pub fn parse_create_token(&self, response: HttpResponse) -> VaultResult<TokenResponse> {
        check_status(&response, OK_ONLY)?;
        decode(&response)
    }

    fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> HttpRequest {
        let mut headers = vec![(TOKEN_HEADER.to_string(), self.token.expose_secret().to_string())];
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url: format!("{}/v1/{path}", self.base_url),
            headers,
            body,
        }
    }
}

/// Percent-encode every `/`-separated segment; a leading `/` is dropped.
fn secret_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-encode `raw` as a single path segment, so `/`, `?`, `#` and `%`
/// stay part of the name.
fn segment(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

fn require_key_name(name: &str) -> VaultResult<()> {
    if name.is_empty() {
        return Err(VaultError::invalid_argument("key name must not be empty"));
    }
    Ok(())
}

fn encode<B: Serialize + ?Sized>(body: &B) -> VaultResult<String> {
    serde_json::to_string(body).map_err(|e| VaultError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> VaultResult<T> {
    serde_json::from_str(&response.body).map_err(|e| VaultError::Deserialization(e.to_string()))
}

/// Map a status outside `expected` to `VaultError::Service`.
///
/// The body is decoded as `{"errors": [...]}`. A body that is not an error
/// document becomes the single message; an empty body gives no messages.
fn check_status(response: &HttpResponse, expected: &[u16]) -> VaultResult<()> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    let body = response.body.trim();
    let messages = if body.is_empty() {
        Vec::new()
    } else {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => err.errors,
            Err(_) => vec![body.to_string()],
        }
    };
    Err(VaultError::Service {
        status: response.status,
        messages,
    })
}
