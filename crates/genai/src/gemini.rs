use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    api_errors::classify_failure,
    client::{GenerateRequest, GenerativeApi},
    error::GenAiError,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Heavier model used for long-form explanations.
pub const MODEL_FLASH: &str = "gemini-2.5-flash";
/// Free-tier friendly model used for structured outputs and chat follow-ups.
pub const MODEL_FLASH_LITE: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("GEMINI_API_KEY").unwrap_or_default())
    }
}

/// HTTP client for the generative-language endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        )
    }

    /// Pull the first candidate's text out of a generateContent response.
    fn extract_candidate_text(payload: &Value) -> Result<String, GenAiError> {
        payload
            .get("candidates")
            .and_then(|candidates| candidates.get(0))
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|parts| parts.get(0))
            .and_then(|part| part.get("text"))
            .and_then(|text| text.as_str())
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenAiError::MalformedResponse("response carried no candidate text".to_string())
            })
    }
}

#[async_trait]
impl GenerativeApi for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenAiError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenAiError::MissingApiKey);
        }

        let mut payload = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
        });
        if let Some(schema) = &request.response_schema {
            payload["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }

        tracing::debug!(model = %request.model, "sending generate request");

        let response = self
            .http
            .post(self.endpoint(&request.model))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| GenAiError::MalformedResponse(err.to_string()))?;
        Self::extract_candidate_text(&body)
    }
}
