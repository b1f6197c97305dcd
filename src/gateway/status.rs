use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::video::heygen_key_missing;
use super::{json_body, vendor_message, GatewayError, JobStatusApi, JobStatusReport};
use crate::config::VideoConfig;

pub const VIDEO_ID_REQUIRED: &str = "Bad Request: videoId query parameter is required.";
pub const INVALID_STATUS: &str = "Failed to get video status: Invalid response from Heygen.";

/// Gateway to the HeyGen video status endpoint
#[derive(Debug, Clone)]
pub struct JobStatusGateway {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl JobStatusGateway {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/v1/video_status.get",
                config.base_url.trim_end_matches('/')
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fail fast when no API key was configured
    pub fn ensure_configured(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or_else(heygen_key_missing)
    }
}

/// Reshape a successful vendor status payload into our report
pub fn normalize_status(payload: &serde_json::Value) -> Result<JobStatusReport, GatewayError> {
    let text = |pointer: &str| {
        payload
            .pointer(pointer)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let status = text("/data/status").ok_or_else(|| GatewayError::upstream(500, INVALID_STATUS))?;

    Ok(JobStatusReport {
        status,
        video_url: text("/data/video_url"),
        error: text("/data/error_message").or_else(|| {
            // Some failures carry a structured error instead of a message
            payload
                .pointer("/data/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        }),
    })
}

#[async_trait]
impl JobStatusApi for JobStatusGateway {
    async fn job_status(&self, video_id: &str) -> Result<JobStatusReport, GatewayError> {
        let api_key = self.ensure_configured()?;

        if video_id.trim().is_empty() {
            return Err(GatewayError::Validation(VIDEO_ID_REQUIRED.to_string()));
        }

        tracing::debug!(video_id, "Checking video status");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("video_id", video_id)])
            .header("X-Api-Key", api_key)
            .header("Accept", "application/json")
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Video status request failed: {}", e);
                GatewayError::upstream(500, "Internal Server Error")
            })?;

        let status = response.status();
        let payload = json_body(response).await;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %payload, "Heygen status API error response");
            let message = vendor_message(&payload)
                .unwrap_or_else(|| format!("Heygen Status API Error: {}", status));
            // 404 usually means the id is wrong or not yet visible; keep it distinguishable
            let code = if status == StatusCode::NOT_FOUND { 404 } else { 500 };
            return Err(GatewayError::upstream(code, message));
        }

        normalize_status(&payload).map_err(|e| {
            tracing::error!(body = %payload, "Could not determine status from Heygen response");
            e
        })
    }
}
