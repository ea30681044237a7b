use async_trait::async_trait;

use crate::services::gemini::{GeminiClient, ModelError, Part};

pub const AUDIO_MIME: &str = "audio/mp3";
pub const VIDEO_MIME: &str = "video/mp4";

pub const AUDIO_PROMPT: &str =
    "This is the audiotrack for someone's day. Please provide a description of this day.";
pub const VIDEO_PROMPT: &str = "This is a video that someone has taken to illustrate their day. Please describe this video in detail keeping this in mind.";

/// Produces free-text descriptions of base64 encoded media.
#[async_trait]
pub trait MediaDescriber: Send + Sync {
    async fn describe_audio(&self, audio_base64: String) -> Result<String, ModelError>;
    async fn describe_video(&self, video_base64: String) -> Result<String, ModelError>;
}

pub struct GeminiDescriber {
    client: GeminiClient,
    audio_model: String,
    video_model: String,
}

impl GeminiDescriber {
    pub fn new(client: GeminiClient, audio_model: String, video_model: String) -> Self {
        Self {
            client,
            audio_model,
            video_model,
        }
    }
}

#[async_trait]
impl MediaDescriber for GeminiDescriber {
    async fn describe_audio(&self, audio_base64: String) -> Result<String, ModelError> {
        let parts = [Part::text(AUDIO_PROMPT), Part::inline(AUDIO_MIME, audio_base64)];
        self.client.generate(&self.audio_model, &parts).await
    }

    async fn describe_video(&self, video_base64: String) -> Result<String, ModelError> {
        let parts = [Part::text(VIDEO_PROMPT), Part::inline(VIDEO_MIME, video_base64)];
        self.client.generate(&self.video_model, &parts).await
    }
}
