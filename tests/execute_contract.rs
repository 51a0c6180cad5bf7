//! Contract tests for the `/execute` surface that hold without a browser:
//! envelope validation, the reference discipline, and health plumbing.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use gaia_cli::config::AppConfig;
use gaia_cli::server::{build_router, AppState};

fn test_state() -> AppState {
    let mut config = AppConfig::default();
    config.data_root = std::env::temp_dir().join("gaia-test");
    AppState::new(config)
}

async fn post_execute(body: Value) -> (StatusCode, Value) {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/execute")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_action_is_a_structured_400() {
    let (status, body) = post_execute(json!({
        "action": "browser_frobnicate",
        "params": {}
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["reason_code"], json!("invalid_input"));
    assert_eq!(body["detail"]["reason_code"], json!("invalid_input"));
}

#[tokio::test]
async fn element_act_with_selector_is_forbidden_without_touching_a_browser() {
    let (status, body) = post_execute(json!({
        "action": "browser_act",
        "params": {
            "session_id": "contract-test",
            "snapshot_id": "contract-test:1:abcdef012345",
            "ref_id": "t0-f0-e0",
            "kind": "click",
            "selector": ".btn"
        }
    }))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["effective"], json!(false));
    assert_eq!(body["reason_code"], json!("legacy_selector_forbidden"));
}

#[tokio::test]
async fn element_act_without_refs_is_ref_required() {
    let (status, body) = post_execute(json!({
        "action": "act",
        "params": {
            "session_id": "contract-test",
            "kind": "click"
        }
    }))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason_code"], json!("ref_required"));
}

#[tokio::test]
async fn selector_hint_alone_is_not_a_selector_violation() {
    // selector_hint is accepted and ignored; missing refs still dominate.
    let (_, body) = post_execute(json!({
        "action": "browser_act",
        "params": {
            "session_id": "contract-test",
            "kind": "click",
            "selector_hint": ".btn"
        }
    }))
    .await;
    assert_eq!(body["reason_code"], json!("ref_required"));
}

#[tokio::test]
async fn wait_without_conditions_is_invalid_input() {
    let (status, body) = post_execute(json!({
        "action": "browser_wait",
        "params": { "session_id": "contract-test" }
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["reason_code"], json!("invalid_input"));
}

#[tokio::test]
async fn act_requires_a_kind() {
    let (status, body) = post_execute(json!({
        "action": "browser_act",
        "params": { "session_id": "contract-test" }
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason_code"], json!("invalid_input"));
}
