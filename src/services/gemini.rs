//! Minimal client for the Gemini `generateContent` REST endpoint.

use serde::{Deserialize, Serialize};
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid model endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("model request failed: {0}")]
    Request(reqwest::Error),
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("model returned no text")]
    EmptyResponse,
}

/// One piece of a prompt: instruction text or an inline base64 attachment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn inline(mime_type: &str, data: impl Into<String>) -> Self {
        Part::InlineData(InlineData {
            mime_type: mime_type.to_string(),
            data: data.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: &'a [Part],
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> Result<Url, ModelError> {
        let url = Url::parse(&format!("{}/", self.api_base.trim_end_matches('/')))?
            .join(&format!("v1beta/models/{}:generateContent", model))?;
        Ok(url)
    }

    /// Sends one user turn and returns the concatenated text of the first
    /// candidate.
    pub async fn generate(&self, model: &str, parts: &[Part]) -> Result<String, ModelError> {
        let url = self.endpoint(model)?;
        let body = GenerateContentRequest {
            contents: [Content { role: "user", parts }],
        };

        tracing::debug!(model, parts = parts.len(), "Sending generateContent request");

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(request_error)?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Strips the request URL from transport errors before they are displayed.
fn request_error(e: reqwest::Error) -> ModelError {
    ModelError::Request(e.without_url())
}
