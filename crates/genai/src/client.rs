use async_trait::async_trait;
use serde_json::Value;

use crate::error::GenAiError;

/// One text-in/text-out request against the generative endpoint. When
/// `response_schema` is set the endpoint is asked for JSON conforming to the
/// schema and the returned text is that JSON document.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub response_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            response_schema: None,
        }
    }

    pub fn structured(
        model: impl Into<String>,
        prompt: impl Into<String>,
        response_schema: Value,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            response_schema: Some(response_schema),
        }
    }
}

/// Seam to the hosted generative model. Implementations own transport and
/// candidate extraction; callers own prompt construction and payload parsing.
#[async_trait]
pub trait GenerativeApi: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, GenAiError>;
}
