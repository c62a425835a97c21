use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde_json::json;
use tap_core::config::ProviderDescription;
use tap_core::{ActionService, EngineSettings, IdentityIntrospection, MemoryStore, RedbStore};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const PREFIX: &str = "/token";

fn app() -> axum::Router {
    let service = ActionService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(IdentityIntrospection::new("https://auth.example.org")),
        EngineSettings::default(),
    );
    let state = tap_server::AppState::new(service, ProviderDescription::default());
    tap_server::build_router(state, PREFIX)
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    caller: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut req = axum::http::Request::builder().method(method).uri(uri);
    if let Some(identity) = caller {
        req = req.header("x-tap-identity", identity);
    }
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            axum::body::Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => axum::body::Body::empty(),
    };
    let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn run(app: &axum::Router, caller: &str, request_id: &str) -> (StatusCode, serde_json::Value) {
    send(
        app,
        "POST",
        "/token/run",
        Some(caller),
        Some(json!({ "request_id": request_id, "body": {} })),
    )
    .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn describe_is_public() {
    let app = app();
    let (status, json) = send(&app, "GET", PREFIX, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "Token Passthru Action Provider");
    assert_eq!(json["synchronous"], true);
    assert_eq!(json["visible_to"][0], "public");
}

#[tokio::test]
async fn run_returns_succeeded_record_with_userinfo() {
    let app = app();
    let (status, json) = run(&app, "alice", "r1").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "SUCCEEDED");
    assert_eq!(json["creator_id"], "alice");
    assert_eq!(json["release_after"], "P30D");
    assert_eq!(
        json["details"]["userinfo"]["client"]["id"],
        "https://auth.example.org/alice"
    );
    assert!(json["completion_time"].is_string());
}

#[tokio::test]
async fn repeated_run_returns_same_action() {
    let app = app();
    let (_, first) = run(&app, "alice", "r1").await;
    let (status, second) = run(&app, "alice", "r1").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(first["action_id"], second["action_id"]);
    assert_eq!(first["completion_time"], second["completion_time"]);
}

#[tokio::test]
async fn missing_identity_is_401() {
    let app = app();
    let (status, json) = send(
        &app,
        "POST",
        "/token/run",
        None,
        Some(json!({ "request_id": "r1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn empty_request_id_is_400() {
    let app = app();
    let (status, _) = run(&app, "alice", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_release_after_is_400_with_json_error() {
    let app = app();
    let (status, json) = send(
        &app,
        "POST",
        "/token/run",
        Some("alice"),
        Some(json!({ "request_id": "r1", "release_after": "P1Y" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("invalid request"));
}

#[tokio::test]
async fn missing_request_id_is_400_with_json_error() {
    let app = app();
    let (status, json) = send(
        &app,
        "POST",
        "/token/run",
        Some("alice"),
        Some(json!({ "body": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("request_id"));

    let (status, _) = run(&app, "alice", "r1").await;
    assert_eq!(status, StatusCode::ACCEPTED, "nothing was reserved by the bad body");
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let app = app();
    let (_, rec) = run(&app, "alice", "r1").await;
    let id = rec["action_id"].as_str().unwrap().to_string();

    let (status, polled) = send(&app, "GET", &format!("/token/{id}/status"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled, rec);

    let (status, canceled) =
        send(&app, "POST", &format!("/token/{id}/cancel"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "SUCCEEDED");

    let (status, released) =
        send(&app, "POST", &format!("/token/{id}/release"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(released["action_id"], id.as_str());

    let (status, _) = send(&app, "GET", &format!("/token/{id}/status"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn other_callers_see_404_like_missing_actions() {
    let app = app();
    let (_, rec) = run(&app, "bob", "r2").await;
    let id = rec["action_id"].as_str().unwrap();

    for (method, op) in [("GET", "status"), ("POST", "cancel"), ("POST", "release")] {
        let (hidden, hidden_body) =
            send(&app, method, &format!("/token/{id}/{op}"), Some("mallory"), None).await;
        let (missing, _) =
            send(&app, method, &format!("/token/nope/{op}"), Some("mallory"), None).await;
        assert_eq!(hidden, StatusCode::NOT_FOUND, "{op}");
        assert_eq!(missing, StatusCode::NOT_FOUND, "{op}");
        assert!(hidden_body["error"].as_str().unwrap().contains("not found"));
    }
}

#[tokio::test]
async fn monitor_group_member_can_poll_but_not_release() {
    let app = app();
    let (_, rec) = send(
        &app,
        "POST",
        "/token/run",
        Some("alice"),
        Some(json!({ "request_id": "r5", "monitor_by": ["group:ops"] })),
    )
    .await;
    let id = rec["action_id"].as_str().unwrap();

    let req = axum::http::Request::builder()
        .uri(format!("/token/{id}/status"))
        .header("x-tap-identity", "erin")
        .header("x-tap-groups", "group:ops")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/token/{id}/release"))
        .header("x-tap-identity", "erin")
        .header("x-tap-groups", "group:ops")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn records_persist_across_router_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("actions.redb");

    let build = |store: RedbStore| {
        let service = ActionService::new(
            Arc::new(store),
            Arc::new(IdentityIntrospection::new("iss")),
            EngineSettings::default(),
        );
        tap_server::build_router(
            tap_server::AppState::new(service, ProviderDescription::default()),
            PREFIX,
        )
    };

    let id = {
        let app = build(RedbStore::open(&path).unwrap());
        let (_, rec) = run(&app, "alice", "r1").await;
        rec["action_id"].as_str().unwrap().to_string()
    };

    let app = build(RedbStore::open(&path).unwrap());
    let (status, rec) = send(&app, "GET", &format!("/token/{id}/status"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rec["status"], "SUCCEEDED");

    let (_, again) = run(&app, "alice", "r1").await;
    assert_eq!(again["action_id"], id.as_str());
}
