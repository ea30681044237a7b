use axum::{
    http::header,
    response::{Html, IntoResponse, Json},
};
use serde::Serialize;

use crate::error::AppError;

const UPLOAD_PAGE: &str = include_str!("../../static/upload.html");
const RESULT_PAGE: &str = include_str!("../../static/generated.html");
const SCRIPT: &str = include_str!("../../static/script.js");
const STYLE: &str = include_str!("../../static/style.css");

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Upload page HTML", content_type = "text/html")
    ),
    tag = "General"
)]
pub async fn root() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

pub async fn result_page() -> Html<&'static str> {
    Html(RESULT_PAGE)
}

pub async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], SCRIPT)
}

pub async fn style() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], STYLE)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    ),
    tag = "General"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Daysong server is running".to_string(),
    })
}

pub async fn not_found() -> AppError {
    AppError::NotFound("File not found".to_string())
}
