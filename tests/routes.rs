mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use blogcast::config::Config;
use blogcast::server::{router, AppState};

fn app(config: &Config) -> Router {
    router(AppState::from_config(config), &[])
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn summarize_returns_summary() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        post_json("/api/summarize", r#"{"content": "Ownership explained.", "notes": "short"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"summary": common::SUMMARY}));
}

#[tokio::test]
async fn summarize_requires_content() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(app(&common::config_for(&url)), post_json("/api/summarize", "{}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Blog content is required"}));
}

#[tokio::test]
async fn summarize_rejects_malformed_json() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        post_json("/api/summarize", "{not json"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Bad Request: "));
}

#[tokio::test]
async fn summarize_without_key_is_a_configuration_error() {
    let (status, body) = call(
        app(&Config::default()),
        post_json("/api/summarize", r#"{"content": "text"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Server configuration error: OpenAI API key not found."})
    );
}

#[tokio::test]
async fn summarize_vendor_failure_is_500_with_message() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        post_json("/api/summarize", r#"{"content": "RATE_LIMIT"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Rate limit reached"}));
}

#[tokio::test]
async fn generate_returns_video_id() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        post_json("/api/generate-heygen-video", r#"{"script": "Hello there"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"videoId": "vid_123"}));
}

#[tokio::test]
async fn generate_requires_string_script() {
    let (url, _vendor) = common::spawn_vendor().await;

    for payload in [r#"{}"#, r#"{"script": 42}"#, r#"{"script": ""}"#] {
        let (status, body) = call(
            app(&common::config_for(&url)),
            post_json("/api/generate-heygen-video", payload),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {}", payload);
        assert_eq!(
            body,
            json!({"error": "Bad Request: script is required and must be a string."})
        );
    }
}

#[tokio::test]
async fn generate_forwards_vendor_status() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        post_json("/api/generate-heygen-video", r#"{"script": "bad avatar"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Avatar not found"}));
}

#[tokio::test]
async fn generate_without_key_is_a_configuration_error() {
    let (status, body) = call(
        app(&Config::default()),
        post_json("/api/generate-heygen-video", r#"{"script": "Hello"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Server configuration error: Heygen API key not found."})
    );
}

#[tokio::test]
async fn status_requires_video_id() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(app(&common::config_for(&url)), get("/api/heygen-video-status")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "Bad Request: videoId query parameter is required."})
    );
}

#[tokio::test]
async fn status_returns_normalized_report() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        get("/api/heygen-video-status?videoId=vid_123"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "processing", "videoUrl": null, "error": null})
    );
}

#[tokio::test]
async fn status_not_found_stays_404() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        get("/api/heygen-video-status?videoId=missing"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Video not found"}));
}

#[tokio::test]
async fn health_reports_configured_providers() {
    let mut config = Config::default();
    config.summarization.api_key = Some(common::OPENAI_KEY.to_string());

    let (status, body) = call(app(&config), get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "summarization": true, "video": false})
    );
}

#[tokio::test]
async fn status_rejects_malformed_query_with_error_body() {
    let (url, _vendor) = common::spawn_vendor().await;
    let (status, body) = call(
        app(&common::config_for(&url)),
        get("/api/heygen-video-status?videoId=a&videoId=b"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Bad Request: Failed to deserialize query string"));
}

#[tokio::test]
async fn status_checks_key_before_query() {
    let (status, body) = call(
        app(&Config::default()),
        get("/api/heygen-video-status?videoId=a&videoId=b"),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Server configuration error: Heygen API key not found."})
    );
}
