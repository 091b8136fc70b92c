//! API integration tests

use axum::body::Body;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;
use waypoint::delegation::{Planner, PlannerPolicy, Registry};
use waypoint::store::SqliteStore;
use waypoint::{api, AppState};

async fn setup_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    let store = SqliteStore::new(pool);
    store.migrate().await.expect("Failed to run migrations");

    let planner = Planner::new(PlannerPolicy::new(Registry::trip_planner()), Arc::new(store));
    api::router(AppState::new(planner))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (hyper::StatusCode, serde_json::Value) {
    let builder = hyper::Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, json)
}

async fn open_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/sessions", Some(serde_json::json!({}))).await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_list_specialists() {
    let app = setup_app().await;
    let (status, body) = send(&app, "GET", "/specialists", None).await;
    assert_eq!(status, hyper::StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["museum_expert", "restaurant_expert", "outdoor_expert"]);
}

#[tokio::test]
async fn test_open_and_get_session() {
    let app = setup_app().await;
    let id = open_session(&app).await;

    let (status, body) = send(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert!(body["last_capability_used"].is_null());
    assert_eq!(body["delegations"], 0);
}

#[tokio::test]
async fn test_open_session_with_existing_id_conflicts() {
    let app = setup_app().await;
    let id = uuid::Uuid::new_v4();
    let body = serde_json::json!({ "session_id": id });

    let (status, _) = send(&app, "POST", "/sessions", Some(body.clone())).await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    let (status, _) = send(&app, "POST", "/sessions", Some(body)).await;
    assert_eq!(status, hyper::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_get_unknown_session() {
    let app = setup_app().await;
    let uri = format!("/sessions/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_decide_commit_and_refuse() {
    let app = setup_app().await;
    let id = open_session(&app).await;

    let (status, decision) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "cultural" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(decision["outcome"], "allowed");
    assert_eq!(decision["turn"]["specialist"]["name"], "museum_expert");
    assert_eq!(decision["turn"]["based_on"], 0);

    let (status, state) = send(
        &app,
        "POST",
        &format!("/sessions/{}/commit", id),
        Some(decision["turn"].clone()),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(state["last_capability_used"], "CULTURAL");
    assert_eq!(state["delegations"], 1);

    let (status, refused) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "CULTURAL" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(refused["outcome"], "refused");
    assert_eq!(refused["banned"], "CULTURAL");
    assert_eq!(refused["alternatives"], serde_json::json!(["FOOD", "OUTDOOR"]));
}

#[tokio::test]
async fn test_commit_twice_is_stale() {
    let app = setup_app().await;
    let id = open_session(&app).await;

    let (_, decision) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "food" })),
    )
    .await;
    let commit_uri = format!("/sessions/{}/commit", id);

    let (status, _) = send(&app, "POST", &commit_uri, Some(decision["turn"].clone())).await;
    assert_eq!(status, hyper::StatusCode::OK);
    let (status, _) = send(&app, "POST", &commit_uri, Some(decision["turn"].clone())).await;
    assert_eq!(status, hyper::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_commit_to_wrong_session_is_bad_request() {
    let app = setup_app().await;
    let a = open_session(&app).await;
    let b = open_session(&app).await;

    let (_, decision) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", a),
        Some(serde_json::json!({ "capability": "outdoor" })),
    )
    .await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/commit", b),
        Some(decision["turn"].clone()),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decide_unknown_capability() {
    let app = setup_app().await;
    let id = open_session(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "shopping" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, "Unknown capability: SHOPPING");

    let (_, state) = send(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(state["delegations"], 0);
}

#[tokio::test]
async fn test_decide_invalid_capability() {
    let app = setup_app().await;
    let id = open_session(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_instruction_reflects_state() {
    let app = setup_app().await;
    let id = open_session(&app).await;
    let uri = format!("/sessions/{}/instruction", id);

    let (status, body) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert!(body["instruction"]
        .as_str()
        .unwrap()
        .contains("No specialist is banned this turn."));

    let (_, decision) = send(
        &app,
        "POST",
        &format!("/sessions/{}/decide", id),
        Some(serde_json::json!({ "capability": "outdoor" })),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/sessions/{}/commit", id),
        Some(decision["turn"].clone()),
    )
    .await;

    let (_, body) = send(&app, "GET", &uri, None).await;
    assert!(body["instruction"]
        .as_str()
        .unwrap()
        .contains("`outdoor_expert` (OUTDOOR) is BANNED for this turn."));
}
