use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const UNSUPPORTED_DESCRIPTION: &str = "File type not supported for processing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Processing,
    Completed,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SongInfo {
    pub filename: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProcessingResult {
    Audio {
        description: String,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        audio_description: String,
        video_description: String,
        verdict: String,
        summary: String,
        song_description: String,
        song: SongInfo,
    },
    Other {
        description: String,
    },
}

impl ProcessingResult {
    pub fn unsupported() -> Self {
        ProcessingResult::Other {
            description: UNSUPPORTED_DESCRIPTION.to_string(),
        }
    }
}

/// Progress of one upload's pipeline, keyed by the stored filename.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    pub filename: String,
    pub original_name: String,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingStatus {
    pub fn new(filename: impl Into<String>, original_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            filename: filename.into(),
            original_name: original_name.into(),
            status: Status::Processing,
            message: "Upload received, starting processing".to_string(),
            result: None,
            error: None,
            started_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}
