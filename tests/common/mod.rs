#![allow(dead_code)]

//! A stand-in for the OpenAI and HeyGen endpoints, served on a random local
//! port.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use blogcast::config::{Config, SummarizationConfig, VideoConfig};

pub const OPENAI_KEY: &str = "sk-test";
pub const HEYGEN_KEY: &str = "hg-test";
pub const SUMMARY: &str = "Rust keeps your services fast and safe.";
pub const VIDEO_URL: &str = "https://files.example.com/vid_123.mp4";

#[derive(Clone, Default)]
pub struct VendorState {
    pub status_checks: Arc<AtomicUsize>,
    pub last_prompt: Arc<Mutex<Option<String>>>,
    pub last_video_body: Arc<Mutex<Option<Value>>>,
}

impl VendorState {
    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }
}

/// Serve `app` on 127.0.0.1 and return its base URL
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_vendor() -> (String, VendorState) {
    let state = VendorState::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v2/video/generate", post(generate_video))
        .route("/v1/video_status.get", get(video_status))
        .with_state(state.clone());
    (serve(app).await, state)
}

/// Configuration pointing both providers at `vendor_url` with valid keys
pub fn config_for(vendor_url: &str) -> Config {
    Config {
        summarization: SummarizationConfig {
            api_key: Some(OPENAI_KEY.to_string()),
            base_url: vendor_url.to_string(),
            ..SummarizationConfig::default()
        },
        video: VideoConfig {
            api_key: Some(HEYGEN_KEY.to_string()),
            base_url: vendor_url.to_string(),
            ..VideoConfig::default()
        },
        ..Config::default()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn chat_completions(
    State(state): State<VendorState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if header(&headers, "authorization") != Some("Bearer sk-test") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
            .into_response();
    }

    let prompt = body
        .pointer("/messages/1/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    *state.last_prompt.lock().unwrap() = Some(prompt.clone());

    if prompt.contains("RATE_LIMIT") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "Rate limit reached"}})),
        )
            .into_response();
    }

    let content = if prompt.contains("EMPTY_SUMMARY") { "" } else { SUMMARY };
    Json(json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    }))
    .into_response()
}

async fn generate_video(
    State(state): State<VendorState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if header(&headers, "x-api-key") != Some(HEYGEN_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response();
    }
    *state.last_video_body.lock().unwrap() = Some(body.clone());

    let script = body
        .pointer("/video_inputs/0/voice/input_text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match script {
        "no id please" => Json(json!({"error": null, "data": {}})).into_response(),
        "bad avatar" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Avatar not found"})),
        )
            .into_response(),
        "opaque failure" => (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response(),
        "render failure" => Json(json!({"data": {"video_id": "vid_fail"}})).into_response(),
        _ => Json(json!({"error": null, "data": {"video_id": "vid_123"}})).into_response(),
    }
}

#[derive(Deserialize)]
struct StatusParams {
    video_id: String,
}

async fn video_status(
    State(state): State<VendorState>,
    headers: HeaderMap,
    Query(params): Query<StatusParams>,
) -> Response {
    if header(&headers, "x-api-key") != Some(HEYGEN_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response();
    }

    match params.video_id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Video not found"})),
        )
            .into_response(),
        "broken" => Json(json!({"code": 100, "data": {}})).into_response(),
        "boom" => (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response(),
        "vid_fail" => Json(json!({
            "code": 100,
            "data": {"status": "failed", "error": {"message": "Avatar rendering failed"}}
        }))
        .into_response(),
        _ => {
            let check = state.status_checks.fetch_add(1, Ordering::SeqCst) + 1;
            if check < 2 {
                Json(json!({"code": 100, "data": {"status": "processing", "video_url": null}}))
                    .into_response()
            } else {
                Json(json!({
                    "code": 100,
                    "data": {"status": "completed", "video_url": VIDEO_URL, "error_message": null}
                }))
                .into_response()
            }
        }
    }
}
