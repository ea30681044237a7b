use std::path::{Path, PathBuf};
use std::process::Stdio;

use base64::{engine::general_purpose::STANDARD, Engine};
use tokio::process::Command;
use tracing::{info, warn};

use crate::utils::format_size;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("ffmpeg exited with {status}: {stderr}")]
    Ffmpeg { status: String, stderr: String },
}

/// Turns local media into base64 payloads for the model endpoints.
#[derive(Debug, Clone)]
pub struct MediaEncoder {
    ffmpeg_path: String,
}

impl MediaEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub async fn encode_file(&self, path: &Path) -> Result<String, MediaError> {
        let data = tokio::fs::read(path).await.map_err(|source| MediaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(STANDARD.encode(data))
    }

    /// Demuxes the audio track of a video to a sibling `<stem>_audio.mp3`,
    /// encodes it, and removes the temporary file.
    pub async fn extract_audio(&self, video_path: &Path) -> Result<String, MediaError> {
        let audio_path = temp_audio_path(video_path);
        info!(video = %video_path.display(), "Extracting audio track");

        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(video_path)
            .args(["-vn", "-acodec", "mp3", "-ab", "128k", "-ar", "44100", "-y"])
            .arg(&audio_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        if !output.status.success() {
            remove_quietly(&audio_path).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.lines().rev().take(5).collect::<Vec<_>>();
            return Err(MediaError::Ffmpeg {
                status: output.status.to_string(),
                stderr: stderr.into_iter().rev().collect::<Vec<_>>().join("\n"),
            });
        }

        let encoded = self.encode_file(&audio_path).await;
        remove_quietly(&audio_path).await;
        let encoded = encoded?;

        info!(base64_len = encoded.len(), "Audio extraction complete");
        Ok(encoded)
    }

    /// Encodes the whole container as-is. This is not audio-only; it stands
    /// in for the demuxed track when ffmpeg is unavailable.
    pub async fn extract_audio_fallback(&self, video_path: &Path) -> Result<String, MediaError> {
        let encoded = self.encode_file(video_path).await?;
        info!(
            video = %video_path.display(),
            size = %format_size(encoded.len()),
            "Encoded full video container in place of its audio track"
        );
        Ok(encoded)
    }
}

pub fn temp_audio_path(video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = video_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}_audio.mp3", stem))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary audio file");
        }
    }
}
