use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::gateway::status::VIDEO_ID_REQUIRED;
use crate::gateway::video::SCRIPT_REQUIRED;
use crate::gateway::{
    GatewayError, JobStatusApi, JobStatusReport, SummarizationApi, SummarizeRequest,
    VideoGenerationApi,
};

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn bad_json(rejection: JsonRejection) -> GatewayError {
    GatewayError::Validation(format!("Bad Request: {}", rejection.body_text()))
}

fn bad_query(rejection: QueryRejection) -> GatewayError {
    GatewayError::Validation(format!("Bad Request: {}", rejection.body_text()))
}

/// POST /api/summarize
pub async fn summarize(
    State(state): State<AppState>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    state.summarizer.ensure_configured()?;
    let Json(request) = body.map_err(bad_json)?;

    let summary = state.summarizer.summarize(&request).await?;
    Ok(Json(json!({ "summary": summary })))
}

/// POST /api/generate-heygen-video
pub async fn generate_video(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    state.generator.ensure_configured()?;
    let Json(body) = body.map_err(bad_json)?;

    let script = match body.get("script") {
        Some(Value::String(script)) if !script.is_empty() => script,
        _ => return Err(GatewayError::Validation(SCRIPT_REQUIRED.to_string())),
    };

    let video_id = state.generator.generate_video(script).await?;
    Ok(Json(json!({ "videoId": video_id })))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// GET /api/heygen-video-status?videoId=...
pub async fn video_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<JobStatusReport>, GatewayError> {
    state.status.ensure_configured()?;
    let Query(query) = query.map_err(bad_query)?;

    let video_id = query
        .video_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| GatewayError::Validation(VIDEO_ID_REQUIRED.to_string()))?;

    let report = state.status.job_status(&video_id).await?;
    Ok(Json(report))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "summarization": state.summarizer.is_configured(),
        "video": state.generator.is_configured(),
    }))
}
