use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::models::status::{ProcessingResult, ProcessingStatus, Status};
use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    success: bool,
    status: ProcessingStatus,
}

#[derive(Serialize, ToSchema)]
pub struct ResultsResponse {
    success: bool,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn not_found(filename: &str) -> AppError {
    AppError::NotFound(format!("No processing status found for {}", filename))
}

#[utoipa::path(
    get,
    path = "/api/processing-status/{filename}",
    tag = "Processing",
    params(("filename" = String, Path, description = "Stored filename returned by the upload")),
    responses(
        (status = 200, description = "Current processing status", body = StatusResponse),
        (status = 404, description = "No status recorded for this file")
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.store().get(&filename).ok_or_else(|| not_found(&filename))?;
    Ok(Json(StatusResponse {
        success: true,
        status,
    }))
}

#[utoipa::path(
    get,
    path = "/api/processing-status",
    tag = "Processing",
    responses(
        (status = 200, description = "Every status record keyed by filename", body = BTreeMap<String, ProcessingStatus>)
    )
)]
pub async fn list_statuses(State(state): State<AppState>) -> Json<BTreeMap<String, ProcessingStatus>> {
    Json(state.store().snapshot())
}

#[utoipa::path(
    get,
    path = "/api/processing-results/{filename}",
    tag = "Processing",
    params(("filename" = String, Path, description = "Stored filename returned by the upload")),
    responses(
        (status = 200, description = "Result, error, or in-progress indicator", body = ResultsResponse),
        (status = 404, description = "No status recorded for this file")
    )
)]
pub async fn get_results(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<ResultsResponse>, AppError> {
    let record = state.store().get(&filename).ok_or_else(|| not_found(&filename))?;

    let response = match record.status {
        Status::Completed => ResultsResponse {
            success: true,
            status: Status::Completed,
            result: record.result,
            error: None,
            message: None,
        },
        Status::Error => ResultsResponse {
            success: false,
            status: Status::Error,
            result: None,
            error: record.error,
            message: None,
        },
        Status::Processing => ResultsResponse {
            success: true,
            status: Status::Processing,
            result: None,
            error: None,
            message: Some(record.message),
        },
    };
    Ok(Json(response))
}
