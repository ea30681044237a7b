use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::models::status::SongInfo;
use crate::services::credentials::{CredentialChain, CredentialError};
use crate::utils::format_size;

#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error("GOOGLE_CLOUD_PROJECT must be set for song generation")]
    MissingProject,
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("song request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("song API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    NoAudio(&'static str),
    #[error("song audio is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to write song: {0}")]
    Write(#[from] std::io::Error),
}

/// A generated song as written to disk.
#[derive(Debug, Clone)]
pub struct SongArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub audio: Vec<u8>,
}

impl SongArtifact {
    pub fn info(&self) -> SongInfo {
        SongInfo {
            filename: self.filename.clone(),
            path: self.path.to_string_lossy().into_owned(),
            size: self.audio.len() as u64,
        }
    }
}

#[async_trait]
pub trait SongSynthesizer: Send + Sync {
    /// Returns the decoded audio bytes for the prompt.
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, SongError>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PredictParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    audio_content: Option<String>,
}

/// Vertex AI music model client (`lyria-002` by default).
pub struct LyriaClient {
    pub http: reqwest::Client,
    pub credentials: CredentialChain,
    pub api_base: String,
    pub project: Option<String>,
    pub region: String,
    pub model: String,
    pub negative_prompt: String,
    pub seed: Option<u64>,
}

impl LyriaClient {
    fn predict_url(&self, project: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.api_base.trim_end_matches('/'),
            project,
            self.region,
            self.model
        )
    }
}

#[async_trait]
impl SongSynthesizer for LyriaClient {
    async fn synthesize(&self, prompt: &str) -> Result<Vec<u8>, SongError> {
        let project = self.project.as_deref().ok_or(SongError::MissingProject)?;
        let token = self.credentials.resolve().await?;

        let body = PredictRequest {
            instances: [PredictInstance {
                prompt,
                negative_prompt: &self.negative_prompt,
                seed: self.seed,
            }],
            parameters: PredictParameters { sample_count: 1 },
        };

        tracing::info!(model = %self.model, region = %self.region, "Requesting song generation");

        let response = self
            .http
            .post(self.predict_url(project))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SongError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response.json().await?;
        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or(SongError::NoAudio("No predictions found in response"))?;
        let encoded = prediction
            .bytes_base64_encoded
            .or(prediction.audio_content)
            .ok_or(SongError::NoAudio("No audio content found in the response"))?;

        Ok(STANDARD.decode(encoded)?)
    }
}

/// Writes the song once into `dir` as `<stem>-song-<millis>.wav`.
pub async fn write_song(dir: &Path, stem: &str, audio: Vec<u8>) -> Result<SongArtifact, SongError> {
    tokio::fs::create_dir_all(dir).await?;
    let filename = format!("{}-song-{}.wav", stem, chrono::Utc::now().timestamp_millis());
    let path = dir.join(&filename);
    tokio::fs::write(&path, &audio).await?;

    tracing::info!(path = %path.display(), size = %format_size(audio.len()), "Song written");
    Ok(SongArtifact {
        filename,
        path,
        audio,
    })
}
