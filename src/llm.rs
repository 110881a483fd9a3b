//! Chat-completion transport for OpenAI-compatible endpoints

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmConfig;

/// Failures of a single extraction attempt. Every variant is retried.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("No content in chat-completion response")]
    EmptyResponse,

    #[error("Malformed chat-completion response: {0}")]
    MalformedResponse(String),

    #[error("No JSON array found in output")]
    NoJsonArray,

    #[error("Invalid JSON array: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Schema check failed: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Anything that can answer a system + user conversation with text
pub trait ChatCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ExtractError>;
}

/// Blocking client for `{base_url}/chat/completions`
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    config: LlmConfig,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; MlsStadiumExtractor/1.0)")
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

impl ChatCompletion for OpenAiClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ExtractError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "Sending chat-completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text()?;
        parse_chat_response(&body)
    }
}

/// Text of `choices[0].message.content` from a successful response body
fn parse_chat_response(body: &str) -> Result<String, ExtractError> {
    let chat: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;
    chat.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or(ExtractError::EmptyResponse)
}

/// Parse the text between the first `[` and the last `]` as a JSON array.
/// Anything outside the outermost brackets is discarded.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>, ExtractError> {
    let (Some(first), Some(last)) = (text.find('['), text.rfind(']')) else {
        return Err(ExtractError::NoJsonArray);
    };
    if last < first {
        return Err(ExtractError::NoJsonArray);
    }
    Ok(serde_json::from_str(&text[first..=last])?)
}
