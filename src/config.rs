use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub song_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub google_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_video_model: String,
    pub cloud_project: Option<String>,
    pub cloud_region: String,
    pub vertex_api_base: Option<String>,
    pub lyria_model: String,
    pub song_negative_prompt: String,
    pub song_seed: Option<u64>,
    pub ffmpeg_path: String,
    pub gcloud_path: String,
    pub status_ttl: Option<Duration>,
    pub cleanup_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let google_api_key =
            env::var("GOOGLE_API_KEY").map_err(|_| ConfigError::Missing("GOOGLE_API_KEY"))?;

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 3000)?,
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "uploads")),
            song_dir: PathBuf::from(var_or("SONG_DIR", "generated-songs")),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            google_api_key,
            gemini_api_base: var_or(
                "GEMINI_API_BASE",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_model: var_or("GEMINI_MODEL", "gemini-2.5-flash"),
            gemini_video_model: var_or("GEMINI_VIDEO_MODEL", "gemini-2.0-flash-exp"),
            cloud_project: env::var("GOOGLE_CLOUD_PROJECT")
                .or_else(|_| env::var("GOOGLE_CLOUD_PROJECT_ID"))
                .ok(),
            cloud_region: var_or("GOOGLE_CLOUD_REGION", "us-central1"),
            vertex_api_base: env::var("VERTEX_API_BASE").ok(),
            lyria_model: var_or("LYRIA_MODEL", "lyria-002"),
            song_negative_prompt: var_or("SONG_NEGATIVE_PROMPT", ""),
            song_seed: parse_opt("SONG_SEED")?,
            ffmpeg_path: var_or("FFMPEG_PATH", "ffmpeg"),
            gcloud_path: var_or("GCLOUD_PATH", "gcloud"),
            status_ttl: parse_opt("STATUS_TTL_SECS")?.map(Duration::from_secs),
            cleanup_interval: Duration::from_secs(parse_or("CLEANUP_INTERVAL_SECS", 3600)?),
        })
    }

    /// Base URL of the Vertex AI endpoint serving the song model.
    pub fn vertex_base(&self) -> String {
        self.vertex_api_base.clone().unwrap_or_else(|| {
            format!("https://{}-aiplatform.googleapis.com", self.cloud_region)
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

fn parse_opt<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            upload_dir: root.join("uploads"),
            song_dir: root.join("generated-songs"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            google_api_key: "test-key".to_string(),
            gemini_api_base: "http://127.0.0.1:9".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_video_model: "gemini-2.0-flash-exp".to_string(),
            cloud_project: Some("test-project".to_string()),
            cloud_region: "us-central1".to_string(),
            vertex_api_base: None,
            lyria_model: "lyria-002".to_string(),
            song_negative_prompt: String::new(),
            song_seed: None,
            ffmpeg_path: "ffmpeg-not-installed-here".to_string(),
            gcloud_path: "gcloud".to_string(),
            status_ttl: None,
            cleanup_interval: Duration::from_secs(3600),
        }
    }
}
