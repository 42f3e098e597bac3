use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inline image sent alongside a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A single request to the generative model: instruction text plus an optional image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPrompt {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePart>,
}

impl ModelPrompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(text: impl Into<String>, image: ImagePart) -> Self {
        Self {
            text: text.into(),
            image: Some(image),
        }
    }
}

/// Failure of one model invocation
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("http error: {0}")]
    Http(String),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("empty model response")]
    EmptyResponse,
    #[error("model task failed: {0}")]
    Join(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Http(err.to_string())
    }
}

/// Opaque text generation capability: given a prompt, returns text, may fail or hang.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelError>;
}
