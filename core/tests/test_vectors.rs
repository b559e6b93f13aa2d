//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector describes inputs, the expected request, a simulated response
//! and the expected parse result. Request bodies are compared as parsed JSON
//! so field order does not matter.

use serde_json::Value;
use vault_core::{
    CreateKeyRequest, HttpMethod, HttpRequest, HttpResponse, KeyMetadata, TokenCreateRequest,
    VaultClient, VaultError, VaultResult, TOKEN_HEADER,
};

const BASE_URL: &str = "http://127.0.0.1:8200";
const TOKEN: &str = "vector-token";

fn client() -> VaultClient {
    VaultClient::new(BASE_URL, TOKEN)
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse::new(
        sim["status"].as_u64().unwrap() as u16,
        sim["body"].as_str().unwrap(),
    )
}

fn assert_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.url, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: url");
    assert_eq!(req.header(TOKEN_HEADER), Some(TOKEN), "{name}: token header");

    match &expected["body"] {
        Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
        body => {
            let actual: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&actual, body, "{name}: body");
            assert_eq!(req.header("content-type"), Some("application/json"), "{name}: content-type");
        }
    }
}

// ---------------------------------------------------------------------------
// Transit
// ---------------------------------------------------------------------------

#[test]
fn transit_test_vectors() {
    let raw = include_str!("../../test-vectors/transit.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let key = input["name"].as_str().unwrap();
        let expected = &case["expected_result"];

        match case["operation"].as_str().unwrap() {
            "create_key" => {
                let body = CreateKeyRequest {
                    derived: input["derived"].as_bool().unwrap(),
                };
                let req = c.build_create_key(key, &body).unwrap();
                assert_request(name, &req, &case["expected_request"]);
                c.parse_create_key(simulated(case)).unwrap();
            }
            "get_key" => {
                let req = c.build_get_key(key).unwrap();
                assert_request(name, &req, &case["expected_request"]);
                let meta = c.parse_get_key(simulated(case)).unwrap();
                let want: KeyMetadata = serde_json::from_value(expected.clone()).unwrap();
                assert_eq!(meta, want, "{name}: parsed result");
            }
            "encrypt" => {
                let req = c
                    .build_encrypt(key, input["text"].as_str().unwrap(), input["context"].as_str())
                    .unwrap();
                assert_request(name, &req, &case["expected_request"]);
                let resp = c.parse_encrypt(simulated(case)).unwrap();
                assert_eq!(resp.data.ciphertext, expected.as_str().unwrap(), "{name}: parsed result");
            }
            "decrypt" => {
                let req = c
                    .build_decrypt(key, input["text"].as_str().unwrap(), input["context"].as_str())
                    .unwrap();
                assert_request(name, &req, &case["expected_request"]);
                let resp = c.parse_decrypt(simulated(case)).unwrap();
                assert_eq!(resp.data.plaintext, expected.as_str().unwrap(), "{name}: parsed result");
            }
            other => panic!("{name}: unknown operation {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Run the parse half of `endpoint`, discarding any success value.
fn parse_endpoint(c: &VaultClient, endpoint: &str, response: HttpResponse) -> VaultResult<()> {
    match endpoint {
        "get_key" => c.parse_get_key(response).map(drop),
        "encrypt" => c.parse_encrypt(response).map(drop),
        "write" => c.parse_write(response),
        "delete" => c.parse_delete(response),
        "seal_status" => c.parse_seal_status(response).map(drop),
        "create_token" => c.parse_create_token(response).map(drop),
        "lookup_token" => c.parse_lookup_token(response).map(drop),
        other => panic!("unknown endpoint: {other}"),
    }
}

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let endpoint = case["endpoint"].as_str().unwrap();
        let expected = &case["expected_error"];

        let err = parse_endpoint(&c, endpoint, simulated(case)).unwrap_err();
        let want_messages: Vec<String> = serde_json::from_value(expected["messages"].clone()).unwrap();
        match err {
            VaultError::Service { status, messages } => {
                assert_eq!(u64::from(status), expected["status"].as_u64().unwrap(), "{name}: status");
                assert_eq!(messages, want_messages, "{name}: messages");
            }
            other => panic!("{name}: expected service error, got {other:?}"),
        }
    }
}

#[test]
fn create_token_request_body() {
    let request = TokenCreateRequest::builder()
        .id("fixed-id")
        .policies(["a", "b"])
        .no_parent(true)
        .num_uses(3)
        .renewable(false)
        .build();
    let req = client().build_create_token(&request).unwrap();
    assert_request(
        "create_token_request_body",
        &req,
        &serde_json::json!({
            "method": "POST",
            "path": "/v1/auth/token/create",
            "body": {
                "id": "fixed-id",
                "policies": ["a", "b"],
                "no_parent": true,
                "num_uses": 3,
                "renewable": false
            }
        }),
    );
}
