use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::clients::traits::{GenerativeModel, ModelError, ModelPrompt};
use crate::utils::text::truncate_chars;

const ERROR_BODY_CAP_CHARS: usize = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini `generateContent` client. Built once at startup and shared by every stage.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    vision_model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: api_base.into(),
            vision_model: model.clone(),
            model,
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.runtime.api_key.clone(),
            config.model.api_base.clone(),
            config.model.name.clone(),
        )
        .with_vision_model(config.vision_model())
    }

    /// Use a different model for prompts that carry an image
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    fn endpoint(&self, prompt: &ModelPrompt) -> String {
        let model = if prompt.image.is_some() {
            &self.vision_model
        } else {
            &self.model
        };
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

fn build_request(prompt: &ModelPrompt) -> GenerateRequest {
    let mut parts = vec![RequestPart::Text {
        text: prompt.text.clone(),
    }];
    if let Some(image) = &prompt.image {
        parts.push(RequestPart::Inline {
            inline_data: InlineData {
                mime_type: image.mime_type.clone(),
                data: BASE64.encode(&image.data),
            },
        });
    }
    GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
    }
}

fn response_text(response: GenerateResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &ModelPrompt) -> Result<String, ModelError> {
        let response = self
            .http
            .post(self.endpoint(prompt))
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body: truncate_chars(body.trim(), ERROR_BODY_CAP_CHARS),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = response_text(parsed)?;
        tracing::debug!("Gemini call completed: {} chars", text.len());
        Ok(text)
    }
}
