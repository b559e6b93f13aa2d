//! In-memory stand-in for the Vault HTTP API.
//!
//! Serves the transit, `secret/`, `sys/seal-status` and token endpoints with
//! the same paths, status codes and JSON shapes as the real service. The
//! "encryption" is a keyed XOR: good enough to make ciphertexts opaque and
//! version-bound, useless as cryptography.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_ROOT_TOKEN: &str = "root";
pub const TOKEN_HEADER: &str = "x-vault-token";

/// Default token TTL in seconds (768h).
const DEFAULT_TTL: u64 = 2_764_800;
const KEY_TYPE: &str = "aes256-gcm96";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct KeyVersion {
    pub created: u64,
    pub material: [u8; 16],
}

impl KeyVersion {
    fn generate() -> Self {
        Self {
            created: unix_now(),
            material: *Uuid::new_v4().as_bytes(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransitKey {
    pub name: String,
    pub derived: bool,
    pub deletion_allowed: bool,
    pub min_decryption_version: u32,
    pub min_encryption_version: u32,
    pub versions: BTreeMap<u32, KeyVersion>,
}

impl TransitKey {
    fn new(name: &str, derived: bool) -> Self {
        Self {
            name: name.to_string(),
            derived,
            deletion_allowed: false,
            min_decryption_version: 1,
            min_encryption_version: 0,
            versions: BTreeMap::from([(1, KeyVersion::generate())]),
        }
    }

    pub fn latest_version(&self) -> u32 {
        self.versions.keys().next_back().copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub struct TokenEntry {
    pub id: String,
    pub accessor: String,
    pub policies: Vec<String>,
    pub meta: BTreeMap<String, String>,
    pub display_name: String,
    pub num_uses: u32,
    pub renewable: bool,
    pub ttl: u64,
    pub orphan: bool,
    pub path: String,
}

impl TokenEntry {
    fn root(id: &str) -> Self {
        Self {
            id: id.to_string(),
            accessor: Uuid::new_v4().to_string(),
            policies: vec!["root".to_string()],
            meta: BTreeMap::new(),
            display_name: "root".to_string(),
            num_uses: 0,
            renewable: false,
            ttl: 0,
            orphan: true,
            path: "auth/token/root".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub tokens: HashMap<String, TokenEntry>,
    pub keys: HashMap<String, TransitKey>,
    pub secrets: HashMap<String, Map<String, Value>>,
}

impl Store {
    fn authorize(&self, headers: &HeaderMap) -> Result<&TokenEntry, ApiError> {
        headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|token| self.tokens.get(token))
            .ok_or_else(ApiError::permission_denied)
    }
}

pub type Db = Arc<RwLock<Store>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// `{"errors": [...]}` with a status code, as the real service answers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    errors: Vec<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            errors: vec![message.into()],
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn permission_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission denied")
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            errors: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "errors": self.errors }))).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    app_with_root_token(DEFAULT_ROOT_TOKEN)
}

pub fn app_with_root_token(root_token: &str) -> Router {
    let mut store = Store::default();
    store
        .tokens
        .insert(root_token.to_string(), TokenEntry::root(root_token));
    let db: Db = Arc::new(RwLock::new(store));

    Router::new()
        .route("/v1/sys/seal-status", get(seal_status))
        .route("/v1/auth/token/create", post(create_token))
        .route("/v1/auth/token/lookup/{token}", get(lookup_token))
        .route(
            "/v1/transit/keys/{name}",
            get(read_key).post(create_key).delete(delete_key),
        )
        .route("/v1/transit/keys/{name}/config", post(configure_key))
        .route("/v1/transit/keys/{name}/rotate", post(rotate_key))
        .route("/v1/transit/encrypt/{name}", post(encrypt))
        .route("/v1/transit/decrypt/{name}", post(decrypt))
        .route(
            "/v1/secret/{*path}",
            get(read_secret).post(write_secret).delete(delete_secret),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_root_token(listener, DEFAULT_ROOT_TOKEN).await
}

pub async fn run_with_root_token(listener: TcpListener, root_token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_root_token(root_token)).await
}

// ---------------------------------------------------------------------------
// Transit
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateKey {
    #[serde(default)]
    pub derived: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigureKey {
    pub deletion_allowed: Option<bool>,
    pub min_decryption_version: Option<u32>,
    pub min_encryption_version: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct EncryptInput {
    pub plaintext: String,
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecryptInput {
    pub ciphertext: String,
    pub context: Option<String>,
}

/// Key metadata as returned by `GET transit/keys/{name}`.
#[derive(Debug, Serialize)]
pub struct KeyInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: &'static str,
    pub deletion_allowed: bool,
    pub derived: bool,
    pub exportable: bool,
    pub keys: BTreeMap<String, u64>,
    pub latest_version: u32,
    pub min_decryption_version: u32,
    pub min_encryption_version: u32,
    pub supports_encryption: bool,
    pub supports_decryption: bool,
    pub supports_derivation: bool,
    pub supports_signing: bool,
}

impl From<&TransitKey> for KeyInfo {
    fn from(key: &TransitKey) -> Self {
        Self {
            name: key.name.clone(),
            key_type: KEY_TYPE,
            deletion_allowed: key.deletion_allowed,
            derived: key.derived,
            exportable: false,
            keys: key
                .versions
                .iter()
                .map(|(v, info)| (v.to_string(), info.created))
                .collect(),
            latest_version: key.latest_version(),
            min_decryption_version: key.min_decryption_version,
            min_encryption_version: key.min_encryption_version,
            supports_encryption: true,
            supports_decryption: true,
            supports_derivation: true,
            supports_signing: false,
        }
    }
}

async fn create_key(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    let input: CreateKey = parse_optional_body(&body)?;
    let mut store = db.write().await;
    store.authorize(&headers)?;
    if !store.keys.contains_key(&name) {
        tracing::debug!(key = %name, derived = input.derived, "creating transit key");
        store
            .keys
            .insert(name.clone(), TransitKey::new(&name, input.derived));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn read_key(State(db): State<Db>, headers: HeaderMap, Path(name): Path<String>) -> ApiResult {
    let store = db.read().await;
    store.authorize(&headers)?;
    let key = store.keys.get(&name).ok_or_else(ApiError::not_found)?;
    Ok(envelope(json!(KeyInfo::from(key))))
}

async fn configure_key(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    let input: ConfigureKey = parse_optional_body(&body)?;
    let mut store = db.write().await;
    store.authorize(&headers)?;
    let key = store.keys.get_mut(&name).ok_or_else(|| missing_key(&name))?;

    let latest = key.latest_version();
    if let Some(min) = input.min_decryption_version {
        if min > latest {
            return Err(ApiError::bad_request(format!(
                "cannot set min decryption version of {min}, latest key version is {latest}"
            )));
        }
        key.min_decryption_version = min.max(1);
    }
    if let Some(min) = input.min_encryption_version {
        if min > latest {
            return Err(ApiError::bad_request(format!(
                "cannot set min encryption version of {min}, latest key version is {latest}"
            )));
        }
        key.min_encryption_version = min;
    }
    if let Some(allowed) = input.deletion_allowed {
        key.deletion_allowed = allowed;
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn rotate_key(State(db): State<Db>, headers: HeaderMap, Path(name): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    store.authorize(&headers)?;
    let key = store.keys.get_mut(&name).ok_or_else(|| missing_key(&name))?;
    let next = key.latest_version() + 1;
    key.versions.insert(next, KeyVersion::generate());
    tracing::debug!(key = %name, version = next, "rotated transit key");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_key(State(db): State<Db>, headers: HeaderMap, Path(name): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    store.authorize(&headers)?;
    let key = store
        .keys
        .get(&name)
        .ok_or_else(|| ApiError::bad_request("could not delete key; not found"))?;
    if !key.deletion_allowed {
        return Err(ApiError::bad_request("deletion is not allowed for this key"));
    }
    store.keys.remove(&name);
    tracing::debug!(key = %name, "deleted transit key");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn encrypt(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    let input: EncryptInput = parse_body(&body)?;
    let plaintext = STANDARD
        .decode(&input.plaintext)
        .map_err(|_| ApiError::bad_request("failed to base64-decode plaintext"))?;

    let mut store = db.write().await;
    store.authorize(&headers)?;
    // Encrypting against a missing key creates it, derived if a context came along.
    let key = store
        .keys
        .entry(name.clone())
        .or_insert_with(|| TransitKey::new(&name, input.context.is_some()));
    let context = derivation_context(key, input.context.as_deref())?;

    let version = key.latest_version();
    let material = key.versions[&version].material;
    let sealed = apply_keystream(&material, &context, &plaintext);
    let ciphertext = format!("vault:v{version}:{}", STANDARD.encode(sealed));

    Ok(envelope(json!({ "ciphertext": ciphertext, "key_version": version })))
}

async fn decrypt(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult {
    let input: DecryptInput = parse_body(&body)?;
    let store = db.read().await;
    store.authorize(&headers)?;
    let key = store
        .keys
        .get(&name)
        .ok_or_else(|| ApiError::bad_request("encryption key not found"))?;
    let context = derivation_context(key, input.context.as_deref())?;

    let (version, payload) = split_ciphertext(&input.ciphertext)?;
    if version < key.min_decryption_version {
        return Err(ApiError::bad_request(
            "ciphertext or signature version is disallowed by policy (too old)",
        ));
    }
    let material = key
        .versions
        .get(&version)
        .map(|v| v.material)
        .ok_or_else(|| ApiError::bad_request("invalid key version"))?;
    let sealed = STANDARD
        .decode(payload)
        .map_err(|_| ApiError::bad_request("invalid ciphertext: could not decode"))?;
    let plaintext = apply_keystream(&material, &context, &sealed);

    Ok(envelope(json!({ "plaintext": STANDARD.encode(plaintext) })))
}

fn missing_key(name: &str) -> ApiError {
    ApiError::bad_request(format!("no existing key named {name} could be found"))
}

fn derivation_context(key: &TransitKey, context: Option<&str>) -> Result<Vec<u8>, ApiError> {
    match (key.derived, context) {
        (true, Some(ctx)) => STANDARD
            .decode(ctx)
            .map_err(|_| ApiError::bad_request("failed to base64-decode context")),
        (true, None) => Err(ApiError::bad_request(
            "missing 'context' for key derivation; the key was created using a derived key, \
             which means additional, per-request information must be included in order to \
             perform operations with the key",
        )),
        (false, _) => Ok(Vec::new()),
    }
}

/// Split `vault:v{N}:{payload}` into its version and payload.
pub fn split_ciphertext(ciphertext: &str) -> Result<(u32, &str), ApiError> {
    let rest = ciphertext
        .strip_prefix("vault:v")
        .ok_or_else(|| ApiError::bad_request("invalid ciphertext: no prefix"))?;
    let (version, payload) = rest
        .split_once(':')
        .ok_or_else(|| ApiError::bad_request("invalid ciphertext: no prefix"))?;
    let version = version
        .parse()
        .map_err(|_| ApiError::bad_request("invalid ciphertext: version number could not be decoded"))?;
    Ok((version, payload))
}

/// XOR `data` with the key material, further mixed with the derivation
/// context. Applying it twice with the same inputs yields `data` again.
pub fn apply_keystream(material: &[u8; 16], context: &[u8], data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| {
            let mut k = material[i % material.len()] ^ (i as u8).wrapping_mul(31);
            if !context.is_empty() {
                k ^= context[i % context.len()];
            }
            b ^ k
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Generic secrets
// ---------------------------------------------------------------------------

async fn read_secret(State(db): State<Db>, headers: HeaderMap, Path(path): Path<String>) -> ApiResult {
    let store = db.read().await;
    store.authorize(&headers)?;
    let data = store.secrets.get(&path).ok_or_else(ApiError::not_found)?;
    Ok(Json(json!({
        "request_id": Uuid::new_v4(),
        "lease_id": "",
        "renewable": false,
        "lease_duration": DEFAULT_TTL,
        "data": data,
        "wrap_info": null,
        "warnings": null,
        "auth": null
    }))
    .into_response())
}

async fn write_secret(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult {
    let data: Map<String, Value> = parse_optional_body(&body)?;
    let mut store = db.write().await;
    store.authorize(&headers)?;
    store.secrets.insert(path, data);
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_secret(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(path): Path<String>,
) -> ApiResult {
    let mut store = db.write().await;
    store.authorize(&headers)?;
    store.secrets.remove(&path);
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// System and tokens
// ---------------------------------------------------------------------------

async fn seal_status() -> Json<Value> {
    Json(json!({
        "type": "shamir",
        "initialized": true,
        "sealed": false,
        "t": 1,
        "n": 1,
        "progress": 0,
        "nonce": "",
        "version": "1.15.0",
        "migration": false,
        "cluster_name": "mock-vault",
        "cluster_id": "00000000-0000-0000-0000-000000000000",
        "recovery_seal": false,
        "storage_type": "inmem"
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateToken {
    pub id: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    pub meta: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub no_parent: bool,
    #[serde(default)]
    pub no_default_policy: bool,
    pub ttl: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub num_uses: u32,
    pub renewable: Option<bool>,
}

async fn create_token(State(db): State<Db>, headers: HeaderMap, body: Bytes) -> ApiResult {
    let input: CreateToken = parse_optional_body(&body)?;
    let mut store = db.write().await;
    let parent = store.authorize(&headers)?.clone();

    let id = input.id.unwrap_or_else(|| format!("hvs.{}", Uuid::new_v4().simple()));
    if store.tokens.contains_key(&id) {
        return Err(ApiError::bad_request("cannot create a token with a duplicate ID"));
    }
    let ttl = match input.ttl.as_deref() {
        Some(raw) => parse_ttl(raw).ok_or_else(|| ApiError::bad_request(format!("invalid ttl: {raw}")))?,
        None => DEFAULT_TTL,
    };

    let mut policies = if input.policies.is_empty() {
        parent.policies.clone()
    } else {
        input.policies
    };
    let is_root = policies.iter().any(|p| p == "root");
    if !input.no_default_policy && !is_root && !policies.iter().any(|p| p == "default") {
        policies.push("default".to_string());
    }
    policies.sort();
    policies.dedup();

    let entry = TokenEntry {
        id: id.clone(),
        accessor: Uuid::new_v4().to_string(),
        policies,
        meta: input.meta.unwrap_or_default(),
        display_name: format!("token-{}", input.display_name.unwrap_or_default()),
        num_uses: input.num_uses,
        renewable: input.renewable.unwrap_or(true),
        ttl: if is_root { 0 } else { ttl },
        orphan: input.no_parent,
        path: "auth/token/create".to_string(),
    };
    tracing::debug!(accessor = %entry.accessor, policies = ?entry.policies, "created token");
    let auth = json!({
        "client_token": entry.id,
        "accessor": entry.accessor,
        "policies": entry.policies,
        "token_policies": entry.policies,
        "metadata": entry.meta,
        "lease_duration": entry.ttl,
        "renewable": entry.renewable,
        "entity_id": "",
        "orphan": entry.orphan
    });
    store.tokens.insert(id, entry);

    Ok(Json(json!({
        "request_id": Uuid::new_v4(),
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": null,
        "wrap_info": null,
        "warnings": null,
        "auth": auth
    }))
    .into_response())
}

async fn lookup_token(State(db): State<Db>, headers: HeaderMap, Path(token): Path<String>) -> ApiResult {
    let store = db.read().await;
    store.authorize(&headers)?;
    let entry = store
        .tokens
        .get(&token)
        .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "bad token"))?;
    let meta = if entry.meta.is_empty() {
        Value::Null
    } else {
        json!(entry.meta)
    };
    Ok(envelope(json!({
        "id": entry.id,
        "accessor": entry.accessor,
        "policies": entry.policies,
        "ttl": entry.ttl,
        "creation_ttl": entry.ttl,
        "display_name": entry.display_name,
        "num_uses": entry.num_uses,
        "renewable": entry.renewable,
        "orphan": entry.orphan,
        "path": entry.path,
        "meta": meta,
        "expire_time": null
    })))
}

/// Parse `30`, `30s`, `15m` or `2h` into seconds.
pub fn parse_ttl(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&raw[..i], c),
        _ => (raw, 's'),
    };
    let value: u64 = digits.parse().ok()?;
    match unit {
        's' => Some(value),
        'm' => value.checked_mul(60),
        'h' => value.checked_mul(3600),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Wrap `data` in the standard response envelope with a 200 status.
fn envelope(data: Value) -> Response {
    Json(json!({
        "request_id": Uuid::new_v4(),
        "lease_id": "",
        "renewable": false,
        "lease_duration": 0,
        "data": data,
        "wrap_info": null,
        "warnings": null,
        "auth": null
    }))
    .into_response()
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("failed to parse JSON input: {e}")))
}

/// Like `parse_body`, but an empty body means `T::default()`.
fn parse_optional_body<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
