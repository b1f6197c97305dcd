use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{json_body, vendor_message, GatewayError, SummarizationApi, SummarizeRequest};
use crate::config::SummarizationConfig;

const SYSTEM_PROMPT: &str = "You are an expert content summarizer. Your task is to create clear, \
concise summaries that retain the essential information from the original content.";

/// Fallback shown when the provider gives no usable message
pub const SUMMARIZE_FAILED: &str = "Failed to summarize content";

/// Gateway to the OpenAI chat completions endpoint
#[derive(Debug, Clone)]
pub struct SummarizationGateway {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

impl SummarizationGateway {
    pub fn new(config: &SummarizationConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fail fast when no API key was configured
    pub fn ensure_configured(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or_else(|| {
            GatewayError::Configuration(
                "Server configuration error: OpenAI API key not found.".to_string(),
            )
        })
    }
}

/// Build the user prompt, embedding the caller's instructions when present
pub fn build_prompt(content: &str, notes: Option<&str>) -> String {
    let mut prompt = String::from(
        "Please provide a concise summary of the following blog content.\n\
         The summary should capture the main points and key insights.\n\n",
    );

    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        prompt.push_str("Additional instructions: ");
        prompt.push_str(notes);
        prompt.push_str("\n\n");
    }

    prompt.push_str("Blog content:\n");
    prompt.push_str(content);
    prompt
}

#[async_trait]
impl SummarizationApi for SummarizationGateway {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<String, GatewayError> {
        let api_key = self.ensure_configured()?;

        if request.content.trim().is_empty() {
            return Err(GatewayError::Validation(
                "Blog content is required".to_string(),
            ));
        }

        let prompt = build_prompt(&request.content, request.notes.as_deref());
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::info!(
            model = %self.model,
            content_chars = request.content.chars().count(),
            "Requesting summary"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Summarization request failed: {}", e);
                GatewayError::upstream(500, SUMMARIZE_FAILED)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = json_body(response).await;
            tracing::error!(status = status.as_u16(), body = %body, "Summarization API error response");
            let message = vendor_message(&body).unwrap_or_else(|| SUMMARIZE_FAILED.to_string());
            return Err(GatewayError::upstream(500, message));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Could not decode summarization response: {}", e);
            GatewayError::upstream(500, SUMMARIZE_FAILED)
        })?;

        let summary = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        tracing::debug!(summary_chars = summary.chars().count(), "Summary received");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_without_notes() {
        let prompt = build_prompt("Rust is great.", None);
        assert!(prompt.ends_with("Blog content:\nRust is great."));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_prompt_with_notes() {
        let prompt = build_prompt("Rust is great.", Some("  upbeat tone "));
        assert!(prompt.contains("Additional instructions: upbeat tone\n"));
        assert!(prompt.find("Additional").unwrap() < prompt.find("Blog content").unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_validation() {
        let gateway = SummarizationGateway::new(&SummarizationConfig::default());
        let err = gateway
            .summarize(&SummarizeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Configuration(
                "Server configuration error: OpenAI API key not found.".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let config = SummarizationConfig {
            api_key: Some("sk-test".to_string()),
            ..SummarizationConfig::default()
        };
        let gateway = SummarizationGateway::new(&config);
        let err = gateway
            .summarize(&SummarizeRequest::new("   ", ""))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.to_string(), "Blog content is required");
    }
}
