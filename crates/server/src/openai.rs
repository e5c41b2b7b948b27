// OpenAI-compatible content generator for `ai_generate`
//
// Non-streaming chat completions; the first choice's message is the result.

use async_trait::async_trait;
use creatorflow_engine::action::{ContentGenerator, DeliveryError, GenerationRequest};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;

#[derive(Clone)]
pub struct OpenAiContentGenerator {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiContentGenerator {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        }
    }

    /// Get the API URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request_body(&self, request: &GenerationRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
        }
    }
}

impl std::fmt::Debug for OpenAiContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiContentGenerator")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Rate limits and server errors are worth retrying; other rejections are not
fn classify(status: StatusCode, body: String) -> DeliveryError {
    let message = format!("OpenAI API error ({status}): {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        DeliveryError::Unavailable(message)
    } else {
        DeliveryError::Rejected(message)
    }
}

#[async_trait]
impl ContentGenerator for OpenAiContentGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, DeliveryError> {
        let body = self.request_body(&request);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Unavailable(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify(status, error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Unavailable(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| DeliveryError::Rejected("OpenAI response had no content".to_string()))
    }
}
