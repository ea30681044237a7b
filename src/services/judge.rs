use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::services::gemini::{GeminiClient, ModelError, Part};

const JUDGE_PROMPT: &str = r#"You are a judge that compares audio and video descriptions of the same content.
Your task is to determine if the audio and video descriptions are describing the same content.

Rules:
1. If the descriptions match or are describing the same content, return "True"
2. If the descriptions are different or describing different content, return "False"
3. Only return "True" or "False" - no other text

Audio description: {audio_description}
Video description: {video_description}

Answer:"#;

/// Whether the audio and video descriptions refer to the same content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Same,
    Different,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid similarity value: {0:?}")]
pub struct InvalidVerdict(pub String);

impl FromStr for Verdict {
    type Err = InvalidVerdict;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "True" => Ok(Verdict::Same),
            "False" => Ok(Verdict::Different),
            other => Err(InvalidVerdict(other.to_string())),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Same => "True",
            Verdict::Different => "False",
        })
    }
}

pub fn judge_prompt(audio_description: &str, video_description: &str) -> String {
    JUDGE_PROMPT
        .replace("{audio_description}", audio_description)
        .replace("{video_description}", video_description)
}

/// The `Different` prompt only carries the video description.
pub fn summary_prompt(audio_description: &str, video_description: &str, verdict: Verdict) -> String {
    match verdict {
        Verdict::Same => format!(
            "From these descriptions, summarize the video in a single sentence:\n\nAudio: {}\n\nVideo: {}",
            audio_description, video_description
        ),
        Verdict::Different => format!(
            "From this description, summarize the video in a single sentence:\n\nVideo: {}",
            video_description
        ),
    }
}

pub fn song_description_prompt(summary: &str) -> String {
    format!(
        "Generate a song description based on the following description. Be creative and keep it short:\n\n{}",
        summary
    )
}

/// Text-only model calls made after both descriptions exist.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Raw, trimmed verdict text. Callers parse it into a [`Verdict`].
    async fn judge(&self, audio_description: &str, video_description: &str)
        -> Result<String, ModelError>;

    async fn summarize(
        &self,
        audio_description: &str,
        video_description: &str,
        verdict: Verdict,
    ) -> Result<String, ModelError>;

    async fn describe_song(&self, summary: &str) -> Result<String, ModelError>;
}

pub struct GeminiJudge {
    client: GeminiClient,
    model: String,
}

impl GeminiJudge {
    pub fn new(client: GeminiClient, model: String) -> Self {
        Self { client, model }
    }

    async fn ask(&self, prompt: String) -> Result<String, ModelError> {
        self.client.generate(&self.model, &[Part::text(prompt)]).await
    }
}

#[async_trait]
impl Judge for GeminiJudge {
    async fn judge(
        &self,
        audio_description: &str,
        video_description: &str,
    ) -> Result<String, ModelError> {
        let answer = self
            .ask(judge_prompt(audio_description, video_description))
            .await?;
        Ok(answer.trim().to_string())
    }

    async fn summarize(
        &self,
        audio_description: &str,
        video_description: &str,
        verdict: Verdict,
    ) -> Result<String, ModelError> {
        self.ask(summary_prompt(audio_description, video_description, verdict))
            .await
    }

    async fn describe_song(&self, summary: &str) -> Result<String, ModelError> {
        self.ask(song_description_prompt(summary)).await
    }
}
