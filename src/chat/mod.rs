//! Chat relay - stateless forward of a user message to a hosted
//! completion API.

use async_trait::async_trait;
use serde_json::Value;

/// Errors from completion-provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Provider '{0}' unavailable")]
    ProviderUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::Http(e.to_string())
    }
}

/// A provider that generates one text completion per request. No
/// conversation state is kept on this side of the boundary.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, message: &str) -> Result<String, ChatError>;
    /// Human-readable provider name (e.g. "groq").
    fn name(&self) -> &str;
}

/// Groq-hosted completion endpoint (OpenAI-compatible wire format).
pub struct GroqProvider {
    pub model: String,
    pub base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.groq.com/openai/v1";
    pub const DEFAULT_MODEL: &'static str = "llama3-8b-8192";

    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        GroqProvider {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn parse_response(json: &Value) -> Result<String, ChatError> {
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| ChatError::Parse("Missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    async fn complete(&self, message: &str) -> Result<String, ChatError> {
        if self.api_key.is_empty() {
            return Err(ChatError::Config("Groq API key not configured".to_string()));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": message}],
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::ProviderUnavailable(format!("groq: {}", e)))?
            .error_for_status()?;

        let json: Value = resp.json().await?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &str {
        "groq"
    }
}
