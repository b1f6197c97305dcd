use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::gateway::{
    json_body, GatewayError, Gateways, JobStatusApi, JobStatusReport, SummarizationApi,
    SummarizeRequest, VideoGenerationApi,
};

/// Client for a running `blogcast serve` proxy
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SummaryBody {
    summary: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoIdBody {
    video_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let base_url = crate::utils::validate_and_normalize_url(base_url)?;
        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// All three gateways backed by this client
    pub fn into_gateways(self) -> Gateways {
        let client = Arc::new(self);
        Gateways::new(client.clone(), client.clone(), client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success proxy response into an error carrying its `error`
    /// field, or `fallback` when the body has none
    async fn error_from(response: reqwest::Response, fallback: &str) -> GatewayError {
        let status = response.status().as_u16();
        let body = json_body(response).await;
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .filter(|e| !e.is_empty())
            .unwrap_or(fallback)
            .to_string();
        GatewayError::upstream(status, message)
    }
}

#[async_trait]
impl SummarizationApi for ApiClient {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.url("/api/summarize"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Failed to summarize content").await);
        }

        let body: SummaryBody = response.json().await?;
        Ok(body.summary)
    }
}

#[async_trait]
impl VideoGenerationApi for ApiClient {
    async fn generate_video(&self, script: &str) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.url("/api/generate-heygen-video"))
            .json(&serde_json::json!({ "script": script }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Failed to start video generation").await);
        }

        let body: VideoIdBody = response.json().await?;
        body.video_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::upstream(500, crate::workflow::NO_JOB_ID))
    }
}

#[async_trait]
impl JobStatusApi for ApiClient {
    async fn job_status(&self, video_id: &str) -> Result<JobStatusReport, GatewayError> {
        let response = self
            .client
            .get(self.url("/api/heygen-video-status"))
            .query(&[("videoId", video_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "Failed to fetch video status").await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/").unwrap();
        assert_eq!(client.url("/api/summarize"), "http://localhost:3000/api/summarize");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        assert!(ApiClient::new("ftp://localhost:3000").is_err());
        assert!(ApiClient::new("localhost:3000").is_err());
    }
}
