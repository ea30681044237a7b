use std::path::Path;

use axum::{
    extract::{multipart::Field, multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;
use crate::models::upload::UploadedFile;
use crate::state::AppState;
use crate::utils::{format_size, generate_stored_name};

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    success: bool,
    message: String,
    filename: String,
    original_name: String,
    size: u64,
    path: String,
}

fn too_large(max: u64) -> AppError {
    AppError::BadRequest(format!(
        "File too large, maximum size is {}",
        format_size(max as usize)
    ))
}

fn multipart_error(e: MultipartError, max: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max)
    } else {
        AppError::BadRequest(format!("Invalid multipart data: {}", e.body_text()))
    }
}

/// Streams one multipart field to `path`, refusing to write past `max` bytes.
async fn store_field(field: &mut Field<'_>, path: &Path, max: u64) -> Result<u64, AppError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max))? {
        size += chunk.len() as u64;
        if size > max {
            return Err(too_large(max));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(size)
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "Upload",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored and processing started", body = UploadResponse),
        (status = 400, description = "No file, or file too large"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max = state.config.max_upload_bytes;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        let upload_dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(upload_dir).await?;
        let filename = generate_stored_name(&original_name);
        let path = upload_dir.join(&filename);

        let size = match store_field(&mut field, &path, max).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %rm, "Failed to remove rejected upload");
                }
                tracing::info!(original = %original_name, error = %e, "Upload rejected");
                return Err(e);
            }
        };

        tracing::info!(
            original = %original_name,
            stored = %path.display(),
            size = %format_size(size as usize),
            "File uploaded"
        );

        state.store().begin(&filename, &original_name);
        state.pipeline.spawn(UploadedFile {
            filename: filename.clone(),
            original_name: original_name.clone(),
            size,
            path: path.clone(),
        });

        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            filename,
            original_name,
            size,
            path: path.to_string_lossy().into_owned(),
        }));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}
