use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{json_body, vendor_message, GatewayError, VideoGenerationApi};
use crate::config::VideoConfig;

/// Scripts longer than this are likely to be refused by the provider
pub const SCRIPT_SOFT_LIMIT: usize = 1500;

pub const SCRIPT_REQUIRED: &str = "Bad Request: script is required and must be a string.";
pub const NO_VIDEO_ID: &str = "Failed to start video generation job: No video ID received.";

/// Gateway to the HeyGen video generation endpoint
#[derive(Debug, Clone)]
pub struct VideoGenerationGateway {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    avatar_id: String,
    avatar_style: String,
    voice_id: String,
    width: u32,
    height: u32,
    test_mode: bool,
}

#[derive(Serialize, Debug)]
struct GenerateVideoBody<'a> {
    video_inputs: Vec<VideoInput<'a>>,
    dimension: Dimension,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    test: bool,
    callback_id: String,
}

#[derive(Serialize, Debug)]
struct VideoInput<'a> {
    character: Character<'a>,
    voice: Voice<'a>,
}

#[derive(Serialize, Debug)]
struct Character<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    avatar_id: &'a str,
    avatar_style: &'a str,
}

#[derive(Serialize, Debug)]
struct Voice<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    input_text: &'a str,
    voice_id: &'a str,
}

#[derive(Serialize, Debug)]
struct Dimension {
    width: u32,
    height: u32,
}

impl VideoGenerationGateway {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            endpoint: format!("{}/v2/video/generate", config.base_url.trim_end_matches('/')),
            avatar_id: config.avatar_id.clone(),
            avatar_style: config.avatar_style.clone(),
            voice_id: config.voice_id.clone(),
            width: config.width,
            height: config.height,
            test_mode: config.test_mode,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fail fast when no API key was configured
    pub fn ensure_configured(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or_else(heygen_key_missing)
    }

    fn request_body<'a>(&'a self, script: &'a str) -> GenerateVideoBody<'a> {
        GenerateVideoBody {
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "avatar",
                    avatar_id: &self.avatar_id,
                    avatar_style: &self.avatar_style,
                },
                voice: Voice {
                    kind: "text",
                    input_text: script,
                    voice_id: &self.voice_id,
                },
            }],
            dimension: Dimension {
                width: self.width,
                height: self.height,
            },
            test: self.test_mode,
            callback_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

pub(crate) fn heygen_key_missing() -> GatewayError {
    GatewayError::Configuration("Server configuration error: Heygen API key not found.".to_string())
}

#[async_trait]
impl VideoGenerationApi for VideoGenerationGateway {
    async fn generate_video(&self, script: &str) -> Result<String, GatewayError> {
        let api_key = self.ensure_configured()?;

        if script.is_empty() {
            return Err(GatewayError::Validation(SCRIPT_REQUIRED.to_string()));
        }

        let script_chars = script.chars().count();
        if script_chars > SCRIPT_SOFT_LIMIT {
            tracing::warn!(
                script_chars,
                "Script length might exceed Heygen limit ({} chars)",
                SCRIPT_SOFT_LIMIT
            );
        }

        let body = self.request_body(script);
        tracing::info!(
            avatar_id = %self.avatar_id,
            callback_id = %body.callback_id,
            "Starting video generation job"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Video generation request failed: {}", e);
                GatewayError::upstream(500, "Internal Server Error")
            })?;

        let status = response.status();
        let payload = json_body(response).await;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %payload, "Heygen API error response");
            let message = vendor_message(&payload)
                .unwrap_or_else(|| format!("Heygen API Error: {}", status));
            return Err(GatewayError::upstream(status.as_u16(), message));
        }

        match payload
            .pointer("/data/video_id")
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty())
        {
            Some(video_id) => {
                tracing::info!(video_id, "Video generation job accepted");
                Ok(video_id.to_string())
            }
            None => {
                tracing::error!(body = %payload, "Could not extract video_id from Heygen response");
                Err(GatewayError::upstream(500, NO_VIDEO_ID))
            }
        }
    }
}
