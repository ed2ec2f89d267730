//! Text-generation service client.
//!
//! The pipeline only sees [`TextGenerator`]; [`MistralClient`] is the
//! production implementation speaking the chat-completions wire format.

use crate::config::ServiceConfig;
use crate::error::GenerateError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

/// Sampling is pinned so reruns over the same notebooks give the same answers.
pub const TEMPERATURE: f32 = 0.0;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send the role `instruction` and task `context`, return the reply text.
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, GenerateError>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, GenerateError> {
        (**self).generate(instruction, context).await
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, GenerateError> {
        (**self).generate(instruction, context).await
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Mistral chat-completions client.
#[derive(Debug, Clone)]
pub struct MistralClient {
    client: Client,
    service: ServiceConfig,
}

impl MistralClient {
    pub fn new(service: ServiceConfig) -> Self {
        Self {
            client: Client::new(),
            service,
        }
    }

    pub fn model(&self) -> &str {
        &self.service.model
    }
}

#[async_trait]
impl TextGenerator for MistralClient {
    async fn generate(&self, instruction: &str, context: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            model: &self.service.model,
            temperature: TEMPERATURE,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: context,
                },
            ],
        };

        debug!(model = %self.service.model, endpoint = %self.service.endpoint, "requesting rewrite");
        let response = self
            .client
            .post(&self.service.endpoint)
            .bearer_auth(&self.service.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let body = match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => match err.error_type {
                    Some(kind) => format!("{kind} - {}", err.message),
                    None => err.message,
                },
                Err(_) => body,
            };
            return Err(GenerateError::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerateError::EmptyResponse)
    }
}
