use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod status;
pub mod summarize;
pub mod video;

pub use status::JobStatusGateway;
pub use summarize::SummarizationGateway;
pub use video::VideoGenerationGateway;

/// Errors produced while translating between our contracts and a vendor API
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Missing or malformed caller input
    #[error("{0}")]
    Validation(String),

    /// The vendor (or the proxy) answered with a non-success status
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// A required secret is absent; raised before any network call
    #[error("{0}")]
    Configuration(String),

    /// The request never produced a usable response
    #[error("{0}")]
    Transport(String),
}

impl GatewayError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the proxy answers with for this error
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::Validation(_) => 400,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Configuration(_) => 500,
            GatewayError::Transport(_) => 502,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Body of `POST /api/summarize`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SummarizeRequest {
    pub fn new(content: impl Into<String>, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        Self {
            content: content.into(),
            notes: if notes.trim().is_empty() { None } else { Some(notes) },
        }
    }
}

/// Normalized job status, the body of `GET /api/heygen-video-status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: String,
    pub video_url: Option<String>,
    pub error: Option<String>,
}

/// Turns blog text plus optional instructions into a narration script
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummarizationApi: Send + Sync {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<String, GatewayError>;
}

/// Starts a video-synthesis job and returns its opaque id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoGenerationApi: Send + Sync {
    async fn generate_video(&self, script: &str) -> Result<String, GatewayError>;
}

/// Reports the current status of a video-synthesis job
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStatusApi: Send + Sync {
    async fn job_status(&self, video_id: &str) -> Result<JobStatusReport, GatewayError>;
}

/// The three gateways a workflow run talks to
#[derive(Clone)]
pub struct Gateways {
    pub summarizer: Arc<dyn SummarizationApi>,
    pub generator: Arc<dyn VideoGenerationApi>,
    pub status: Arc<dyn JobStatusApi>,
}

impl Gateways {
    pub fn new(
        summarizer: Arc<dyn SummarizationApi>,
        generator: Arc<dyn VideoGenerationApi>,
        status: Arc<dyn JobStatusApi>,
    ) -> Self {
        Self {
            summarizer,
            generator,
            status,
        }
    }

    /// Gateways that call the vendor APIs directly, built from configuration
    pub fn direct(config: &crate::Config) -> Self {
        Self::new(
            Arc::new(SummarizationGateway::new(&config.summarization)),
            Arc::new(VideoGenerationGateway::new(&config.video)),
            Arc::new(JobStatusGateway::new(&config.video)),
        )
    }
}

/// Pull a human-readable message out of a vendor error body.
///
/// Vendors disagree on the shape: HeyGen uses a top-level `message`, OpenAI
/// nests it under `error.message`, and some answer with a bare `error` string.
pub(crate) fn vendor_message(body: &serde_json::Value) -> Option<String> {
    body.get("message")
        .and_then(|m| m.as_str())
        .or_else(|| body.pointer("/error/message").and_then(|m| m.as_str()))
        .or_else(|| body.get("error").and_then(|m| m.as_str()))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Read a response body as JSON, yielding `Null` when it is not JSON
pub(crate) async fn json_body(response: reqwest::Response) -> serde_json::Value {
    match response.text().await {
        Ok(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::Null),
        Err(_) => serde_json::Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vendor_message_shapes() {
        assert_eq!(
            vendor_message(&json!({"message": "quota exceeded"})),
            Some("quota exceeded".to_string())
        );
        assert_eq!(
            vendor_message(&json!({"error": {"message": "bad key"}})),
            Some("bad key".to_string())
        );
        assert_eq!(
            vendor_message(&json!({"error": "plain"})),
            Some("plain".to_string())
        );
        assert_eq!(vendor_message(&json!({"message": ""})), None);
        assert_eq!(vendor_message(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(GatewayError::Validation("x".into()).http_status(), 400);
        assert_eq!(GatewayError::Configuration("x".into()).http_status(), 500);
        assert_eq!(GatewayError::upstream(404, "gone").http_status(), 404);
        assert_eq!(GatewayError::Transport("reset".into()).http_status(), 502);
    }

    #[test]
    fn test_summarize_request_drops_blank_notes() {
        assert_eq!(SummarizeRequest::new("text", "  ").notes, None);
        assert_eq!(
            SummarizeRequest::new("text", "be brief").notes.as_deref(),
            Some("be brief")
        );
    }

    #[test]
    fn test_status_report_wire_shape() {
        let report: JobStatusReport = serde_json::from_value(json!({
            "status": "completed",
            "videoUrl": "https://x/v.mp4",
            "error": null
        }))
        .unwrap();
        assert_eq!(report.video_url.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "completed", "videoUrl": "https://x/v.mp4", "error": null})
        );
    }
}
