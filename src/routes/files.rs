use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::is_plain_file_name;

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    pub path: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileEntry>,
}

#[utoipa::path(
    get,
    path = "/api/files",
    tag = "Files",
    responses(
        (status = 200, description = "Files waiting in the upload directory", body = FileListResponse),
        (status = 500, description = "Failed to get files")
    )
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FileListResponse>, AppError> {
    let upload_dir = &state.config.upload_dir;
    let mut entries = match tokio::fs::read_dir(upload_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(FileListResponse { files: Vec::new() }));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to read upload directory");
            return Err(AppError::InternalServerError("Failed to get files".to_string()));
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let upload_date = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push(FileEntry {
            filename: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            upload_date,
            path: entry.path().to_string_lossy().into_owned(),
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(Json(FileListResponse { files }))
}

#[utoipa::path(
    get,
    path = "/api/songs/{filename}",
    tag = "Files",
    params(("filename" = String, Path, description = "Generated song file name")),
    responses(
        (status = 200, description = "Song audio", content_type = "audio/wav"),
        (status = 404, description = "Song not found")
    )
)]
pub async fn get_song(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    if !is_plain_file_name(&filename) {
        return Err(AppError::NotFound("Song not found".to_string()));
    }

    let path = state.config.song_dir.join(&filename);
    let audio = match tokio::fs::read(&path).await {
        Ok(audio) => audio,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("Song not found".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(([(header::CONTENT_TYPE, "audio/wav")], audio).into_response())
}
