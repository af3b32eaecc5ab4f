//! Integration tests for the password grant and the co-hosted resource server.
//!
//! Drives the combined router in-process: token issuance, resource access,
//! introspection and revocation.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use oauth_server::config::Config;
use oauth_server::oauth::client_auth::basic_header;
use oauth_server::resource::PROTECTED_PAYLOAD;
use oauth_server::{combined_router, AppState};

const BASE_URL: &str = "https://auth.example.com";

fn build_app(config: Config) -> Router {
    let state = Arc::new(AppState::from_config(config, BASE_URL).unwrap());
    combined_router(state)
}

fn token_request(form: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

fn get(path: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(path);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn password_token(app: &Router, username: &str, scope: &str) -> String {
    let form = format!(
        "grant_type=password&username={}&password=password&scope={}",
        username, scope
    );
    let auth = basic_header("webapp", "secret");
    let (status, body) = send_json(app, token_request(&form, Some(&auth))).await;
    assert_eq!(status, StatusCode::OK, "token request failed: {body}");
    body["access_token"].as_str().unwrap().to_string()
}

// ─── Token endpoint ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_password_grant_issues_token() {
    let app = build_app(Config::default());
    let form = "grant_type=password&username=user1&password=password&scope=read,write,trust";

    let (status, headers, body) =
        send(&app, token_request(form, Some(&basic_header("webapp", "secret")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["token_type"], "bearer");
    assert_eq!(json["expires_in"], 43200);
    assert_eq!(json["scope"], "read trust write");
    assert_eq!(json["access_token"].as_str().unwrap().len(), 48);
}

#[tokio::test]
async fn test_client_credentials_in_form_body() {
    let app = build_app(Config::default());
    let form = "grant_type=password&username=admin&password=password&client_id=webapp&client_secret=secret";
    let (status, json) = send_json(&app, token_request(form, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scope"], "read trust write");
}

#[tokio::test]
async fn test_bad_client_is_401() {
    let app = build_app(Config::default());
    let form = "grant_type=password&username=user1&password=password";

    let (status, headers, body) =
        send(&app, token_request(form, Some(&basic_header("webapp", "wrong")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "invalid_client");

    let (status, json) = send_json(&app, token_request(form, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_endpoint_error_codes() {
    let app = build_app(Config::default());
    let auth = basic_header("webapp", "secret");
    let cases = [
        ("grant_type=password&username=user1&password=nope", "invalid_grant"),
        ("grant_type=password&username=ghost&password=password", "invalid_grant"),
        ("grant_type=client_credentials", "unauthorized_client"),
        ("grant_type=password&username=user1&password=password&scope=admin", "invalid_scope"),
        ("username=user1&password=password", "invalid_request"),
    ];

    for (form, code) in cases {
        let (status, json) = send_json(&app, token_request(form, Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{form}");
        assert_eq!(json["error"], code, "{form}");
    }
}

#[tokio::test]
async fn test_malformed_form_is_invalid_request() {
    let app = build_app(Config::default());
    let auth = basic_header("webapp", "secret");

    // No content type
    let missing_type = Request::post("/oauth/token")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::from("grant_type=password&username=user1&password=password"))
        .unwrap();
    // Repeated field
    let unparsable = token_request("grant_type=password&grant_type=password", Some(&auth));

    for request in [missing_type, unparsable] {
        let (status, headers, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_request");
        assert!(json["error_description"].is_string());
    }

    for path in ["/oauth/check_token", "/oauth/revoke"] {
        let request = Request::post(path)
            .header(header::AUTHORIZATION, &auth)
            .body(Body::from("token=abc"))
            .unwrap();
        let (status, json) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert_eq!(json["error"], "invalid_request", "{path}");
    }
}

// ─── Resource access ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_user_without_admin_role_is_forbidden() {
    let app = build_app(Config::default());
    let token = password_token(&app, "user1", "read,write,trust").await;

    let (status, headers, body) = send(&app, get("/resource/endpoint", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer error=\"insufficient_scope\"");
    assert_ne!(body, PROTECTED_PAYLOAD.as_bytes());
}

#[tokio::test]
async fn test_admin_reaches_protected_resource() {
    let app = build_app(Config::default());
    let token = password_token(&app, "admin", "read,write,trust").await;

    let (status, _, body) = send(&app, get("/resource/endpoint", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PROTECTED_PAYLOAD.as_bytes());
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_401() {
    let app = build_app(Config::default());

    for bearer in [None, Some("not-a-real-token")] {
        let (status, headers, _) = send(&app, get("/resource/endpoint", bearer)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{bearer:?}");
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer error=\"invalid_token\"");
    }
}

#[tokio::test]
async fn test_expired_token_is_401() {
    let mut config = Config::default();
    config.tokens.access_token_validity_secs = 0;
    let app = build_app(config);
    let token = password_token(&app, "admin", "read").await;

    let (status, _, _) = send(&app, get("/resource/endpoint", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_principal_is_attached_for_handlers() {
    let app = build_app(Config::default());
    let token = password_token(&app, "user1", "read,write").await;

    let (status, json) = send_json(&app, get("/resource/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["username"], "user1");
    assert_eq!(json["client_id"], "webapp");
    assert_eq!(json["roles"], serde_json::json!(["USER"]));
    assert_eq!(json["scopes"], serde_json::json!(["read", "write"]));
}

#[tokio::test]
async fn test_missing_scope_is_403() {
    let app = build_app(Config::default());
    // /resource/me requires the read scope
    let token = password_token(&app, "user1", "write").await;

    let (status, _, _) = send(&app, get("/resource/me", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── Introspection and revocation ──────────────────────────────────────────

fn token_param_request(path: &str, token: &str, auth: &str) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, auth)
        .body(Body::from(format!("token={}", token)))
        .unwrap()
}

#[tokio::test]
async fn test_introspection_reports_active_then_inactive_after_revoke() {
    let app = build_app(Config::default());
    let auth = basic_header("webapp", "secret");
    let token = password_token(&app, "admin", "read").await;

    let (status, json) =
        send_json(&app, token_param_request("/oauth/check_token", &token, &auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], true);
    assert_eq!(json["username"], "admin");
    assert_eq!(json["client_id"], "webapp");
    assert_eq!(json["scope"], "read");
    assert_eq!(json["roles"], serde_json::json!(["ADMIN"]));

    let (status, _, _) = send(&app, token_param_request("/oauth/revoke", &token, &auth)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send_json(&app, token_param_request("/oauth/check_token", &token, &auth)).await;
    assert_eq!(json, serde_json::json!({ "active": false }));

    let (status, _, _) = send(&app, get("/resource/endpoint", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_introspection_requires_client_auth() {
    let app = build_app(Config::default());
    let token = password_token(&app, "admin", "read").await;

    let (status, json) = send_json(
        &app,
        token_param_request("/oauth/check_token", &token, &basic_header("webapp", "bad")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "invalid_client");
}

#[tokio::test]
async fn test_revoking_unknown_token_is_ok() {
    let app = build_app(Config::default());
    let (status, _, _) = send(
        &app,
        token_param_request("/oauth/revoke", "unknown", &basic_header("webapp", "secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metadata_lists_endpoints() {
    let app = build_app(Config::default());
    let (status, json) = send_json(
        &app,
        Request::get("/.well-known/oauth-authorization-server")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["issuer"], BASE_URL);
    assert_eq!(json["token_endpoint"], format!("{BASE_URL}/oauth/token"));
    assert_eq!(json["introspection_endpoint"], format!("{BASE_URL}/oauth/check_token"));
    assert_eq!(json["grant_types_supported"], serde_json::json!(["password"]));
    assert_eq!(json["scopes_supported"], serde_json::json!(["read", "trust", "write"]));
}

// ─── Concurrency ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_grants_receive_distinct_tokens() {
    let app = build_app(Config::default());

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let app = app.clone();
            let username = if i % 2 == 0 { "user1" } else { "admin" };
            tokio::spawn(async move { password_token(&app, username, "read").await })
        })
        .collect();

    let mut tokens = std::collections::HashSet::new();
    for handle in handles {
        assert!(tokens.insert(handle.await.unwrap()));
    }
    assert_eq!(tokens.len(), 20);
}

// ─── SQLite backends ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sqlite_tokens_survive_restart() {
    use oauth_server::config::{CredentialsConfig, TokenBackend};

    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("oauth.db");
    let mut config = Config::default();
    config.credentials = CredentialsConfig::Sqlite { path: db_path.clone() };
    config.tokens.store = TokenBackend::Sqlite { path: db_path };

    let token = {
        let app = build_app(config.clone());
        password_token(&app, "admin", "read").await
    };

    let app = build_app(config);
    let (status, _, body) = send(&app, get("/resource/endpoint", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PROTECTED_PAYLOAD.as_bytes());
}

#[tokio::test]
async fn test_metadata_scopes_come_from_credential_database() {
    use oauth_server::config::CredentialsConfig;

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.credentials = CredentialsConfig::Sqlite {
        path: dir.path().join("oauth.db"),
    };
    // Seeds the database with the default client
    build_app(config.clone());

    // Later config entries are seeds only and never reach a non-empty database
    config.clients[0].scopes = ["profile".to_string()].into();
    let app = build_app(config);
    let (status, json) = send_json(
        &app,
        Request::get("/.well-known/oauth-authorization-server")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scopes_supported"], serde_json::json!(["read", "trust", "write"]));
}
