//! Blocking facade over `VaultClient` and a `Transport`.
//!
//! Each method is one build, one round-trip and one parse, except
//! `delete_key`, which first enables deletion on the key and then deletes it.
//! Nothing is retried.

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::client::VaultClient;
use crate::config::VaultConfig;
use crate::error::VaultResult;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    CreateKeyRequest, KeyConfig, KeyMetadata, SealStatus, SecretResponse, TokenCreateRequest,
    TokenResponse,
};

/// Blocking client for transit keys, secrets, seal status and tokens.
///
/// Holds no per-call state, so a shared reference can be used from several
/// threads at once.
#[derive(Debug, Clone)]
pub struct VaultManager<T = UreqTransport> {
    client: VaultClient,
    transport: T,
}

impl VaultManager<UreqTransport> {
    pub fn new(config: &VaultConfig) -> Self {
        Self::with_transport(VaultClient::from_config(config), UreqTransport::new(config.timeout))
    }

    /// Configure from `VAULT_ADDR`, `VAULT_TOKEN` and `VAULT_CLIENT_TIMEOUT`.
    pub fn from_env() -> VaultResult<Self> {
        VaultConfig::from_env().map(|config| Self::new(&config))
    }
}

impl<T: Transport> VaultManager<T> {
    pub fn with_transport(client: VaultClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &VaultClient {
        &self.client
    }

    // -----------------------------------------------------------------------
    // Transit keys
    // -----------------------------------------------------------------------

    /// Create a non-derived key.
    pub fn create_key(&self, name: &str) -> VaultResult<()> {
        self.create_key_with(name, &CreateKeyRequest::default())
    }

    #[instrument(level = "debug", skip_all, fields(key = %name, derived = input.derived))]
    pub fn create_key_with(&self, name: &str, input: &CreateKeyRequest) -> VaultResult<()> {
        let request = self.client.build_create_key(name, input)?;
        self.round_trip(request, VaultClient::parse_create_key)
    }

    #[instrument(level = "debug", skip_all, fields(key = %name))]
    pub fn get_key(&self, name: &str) -> VaultResult<KeyMetadata> {
        let request = self.client.build_get_key(name)?;
        self.round_trip(request, VaultClient::parse_get_key)
    }

    #[instrument(level = "debug", skip_all, fields(key = %name))]
    pub fn update_key_config(&self, name: &str, config: &KeyConfig) -> VaultResult<()> {
        let request = self.client.build_update_key_config(name, config)?;
        self.round_trip(request, VaultClient::parse_update_key_config)
    }

    #[instrument(level = "debug", skip_all, fields(key = %name))]
    pub fn rotate_key(&self, name: &str) -> VaultResult<()> {
        let request = self.client.build_rotate_key(name)?;
        self.round_trip(request, VaultClient::parse_rotate_key)
    }

    /// Mark the key deletable, then delete it.
    ///
    /// If the config update fails the delete is not sent. If the delete
    /// fails the key stays marked deletable.
    #[instrument(level = "debug", skip_all, fields(key = %name))]
    pub fn delete_key(&self, name: &str) -> VaultResult<()> {
        self.update_key_config(name, &KeyConfig::allow_deletion())?;
        let request = self.client.build_delete_key(name)?;
        self.round_trip(request, VaultClient::parse_delete_key)
    }

    // -----------------------------------------------------------------------
    // Encrypt / decrypt
    // -----------------------------------------------------------------------

    /// Encrypt base64 `plaintext` and return the ciphertext.
    pub fn encrypt(&self, name: &str, plaintext: &str) -> VaultResult<String> {
        self.encrypt_with_context(name, plaintext, None)
    }

    #[instrument(level = "debug", skip_all, fields(key = %name, derived = context.is_some()))]
    pub fn encrypt_with_context(
        &self,
        name: &str,
        plaintext: &str,
        context: Option<&str>,
    ) -> VaultResult<String> {
        let request = self.client.build_encrypt(name, plaintext, context)?;
        self.round_trip(request, VaultClient::parse_encrypt)
            .map(|r| r.data.ciphertext)
    }

    /// Decrypt `ciphertext` and return the base64 plaintext.
    pub fn decrypt(&self, name: &str, ciphertext: &str) -> VaultResult<String> {
        self.decrypt_with_context(name, ciphertext, None)
    }

    #[instrument(level = "debug", skip_all, fields(key = %name, derived = context.is_some()))]
    pub fn decrypt_with_context(
        &self,
        name: &str,
        ciphertext: &str,
        context: Option<&str>,
    ) -> VaultResult<String> {
        let request = self.client.build_decrypt(name, ciphertext, context)?;
        self.round_trip(request, VaultClient::parse_decrypt)
            .map(|r| r.data.plaintext)
    }

    // -----------------------------------------------------------------------
    // Generic secret paths
    // -----------------------------------------------------------------------

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub fn read(&self, path: &str) -> VaultResult<Option<SecretResponse>> {
        let request = self.client.build_read(path);
        self.round_trip(request, VaultClient::parse_read)
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub fn write<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> VaultResult<()> {
        let request = self.client.build_write(path, body)?;
        self.round_trip(request, VaultClient::parse_write)
    }

    #[instrument(level = "debug", skip_all, fields(path = %path))]
    pub fn delete(&self, path: &str) -> VaultResult<()> {
        let request = self.client.build_delete(path);
        self.round_trip(request, VaultClient::parse_delete)
    }

    // -----------------------------------------------------------------------
    // System and tokens
    // -----------------------------------------------------------------------

    #[instrument(level = "debug", skip_all)]
    pub fn status(&self) -> VaultResult<SealStatus> {
        let request = self.client.build_seal_status();
        self.round_trip(request, VaultClient::parse_seal_status)
    }

    #[instrument(level = "debug", skip_all)]
    pub fn lookup_token(&self, token: &str) -> VaultResult<TokenResponse> {
        let request = self.client.build_lookup_token(token)?;
        self.round_trip(request, VaultClient::parse_lookup_token)
    }

    #[instrument(level = "debug", skip_all, fields(policies = ?input.policies))]
    pub fn create_token(&self, input: &TokenCreateRequest) -> VaultResult<TokenResponse> {
        let request = self.client.build_create_token(input)?;
        self.round_trip(request, VaultClient::parse_create_token)
    }

    fn round_trip<R>(
        &self,
        request: HttpRequest,
        parse: impl FnOnce(&VaultClient, HttpResponse) -> VaultResult<R>,
    ) -> VaultResult<R> {
        let method = request.method.as_str();
        let response = self.transport.execute(request).inspect_err(|e| {
            warn!(method, error = %e, "vault request did not complete");
        })?;
        let status = response.status;
        let result = parse(&self.client, response);
        match &result {
            Ok(_) => debug!(method, status, "vault request succeeded"),
            Err(e) => warn!(method, status, error = %e, "vault request failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::error::VaultError;
    use crate::http::HttpMethod;

    /// Replays scripted responses and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn execute(&self, request: HttpRequest) -> VaultResult<HttpResponse> {
            self.sent.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| VaultError::Transport("no scripted response left".to_string()))
        }
    }

    impl Transport for &ScriptedTransport {
        fn execute(&self, request: HttpRequest) -> VaultResult<HttpResponse> {
            (**self).execute(request)
        }
    }

    fn manager(transport: &ScriptedTransport) -> VaultManager<&ScriptedTransport> {
        VaultManager::with_transport(VaultClient::new("http://vault:8200", "root"), transport)
    }

    #[test]
    fn delete_key_enables_deletion_then_deletes() {
        let transport = ScriptedTransport::new([HttpResponse::new(204, ""), HttpResponse::new(204, "")]);
        manager(&transport).delete_key("orders").unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://vault:8200/v1/transit/keys/orders/config");
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"deletion_allowed":true}"#));
        assert_eq!(sent[1].method, HttpMethod::Delete);
        assert_eq!(sent[1].url, "http://vault:8200/v1/transit/keys/orders");
    }

    #[test]
    fn delete_key_stops_when_config_update_fails() {
        let transport = ScriptedTransport::new([
            HttpResponse::new(403, r#"{"errors":["permission denied"]}"#),
            HttpResponse::new(204, ""),
        ]);
        let err = manager(&transport).delete_key("orders").unwrap_err();

        assert!(err.is_service_status(403));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn delete_key_reports_failed_delete_without_compensating() {
        let transport = ScriptedTransport::new([
            HttpResponse::new(204, ""),
            HttpResponse::new(500, r#"{"errors":["internal error"]}"#),
        ]);
        let err = manager(&transport).delete_key("orders").unwrap_err();

        assert!(err.is_service_status(500));
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn empty_plaintext_never_reaches_the_transport() {
        let transport = ScriptedTransport::default();
        let m = manager(&transport);

        assert!(matches!(m.encrypt("orders", ""), Err(VaultError::InvalidArgument(_))));
        assert!(matches!(m.decrypt("orders", ""), Err(VaultError::InvalidArgument(_))));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn encrypt_returns_ciphertext() {
        let transport = ScriptedTransport::new([HttpResponse::new(
            200,
            r#"{"request_id":"r","data":{"ciphertext":"vault:v1:abc","key_version":1}}"#,
        )]);
        let ciphertext = manager(&transport).encrypt("orders", "aGVsbG8=").unwrap();
        assert_eq!(ciphertext, "vault:v1:abc");
    }

    #[test]
    fn decrypt_with_context_sends_context() {
        let transport =
            ScriptedTransport::new([HttpResponse::new(200, r#"{"data":{"plaintext":"aGVsbG8="}}"#)]);
        let plaintext = manager(&transport)
            .decrypt_with_context("orders", "vault:v1:abc", Some("dGVuYW50"))
            .unwrap();

        assert_eq!(plaintext, "aGVsbG8=");
        let body: serde_json::Value =
            serde_json::from_str(transport.sent()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["context"], "dGVuYW50");
    }

    #[test]
    fn transport_failure_propagates() {
        let transport = ScriptedTransport::default();
        let err = manager(&transport).status().unwrap_err();
        assert!(matches!(err, VaultError::Transport(_)));
    }

    #[test]
    fn server_error_carries_status_and_messages() {
        let transport = ScriptedTransport::new([HttpResponse::new(
            500,
            r#"{"errors":["storage unavailable","retry later"]}"#,
        )]);
        let err = manager(&transport).read("secret/app").unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.messages().len(), 2);
    }
}
