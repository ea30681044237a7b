mod files;
mod home;
mod status;
mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

/// Headroom over the file limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        home::health,
        upload::upload_file,
        status::get_status,
        status::list_statuses,
        status::get_results,
        files::list_files,
        files::get_song,
    ),
    components(
        schemas(
            home::HealthResponse,
            upload::UploadResponse,
            status::StatusResponse,
            status::ResultsResponse,
            files::FileEntry,
            files::FileListResponse,
            crate::models::status::ProcessingStatus,
            crate::models::status::ProcessingResult,
            crate::models::status::SongInfo,
            crate::models::status::Status,
        )
    ),
    tags(
        (name = "General", description = "Pages and health check"),
        (name = "Upload", description = "Accept a recording and start processing"),
        (name = "Processing", description = "Poll pipeline status and results"),
        (name = "Files", description = "Uploaded files and generated songs")
    ),
    info(
        title = "Daysong API",
        version = "0.1.0",
        description = "Turns an audio or video recording into a description and a generated song",
    )
)]
struct ApiDoc;

pub fn create_routes(state: AppState) -> Router {
    let body_limit = (state.config.max_upload_bytes as usize).saturating_add(MULTIPART_OVERHEAD);

    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let api_routes = Router::new()
        .route("/api/upload", post(upload::upload_file))
        .route("/api/processing-status", get(status::list_statuses))
        .route("/api/processing-status/{filename}", get(status::get_status))
        .route("/api/processing-results/{filename}", get(status::get_results))
        .route("/api/files", get(files::list_files))
        .route("/api/songs/{filename}", get(files::get_song))
        .layer(DefaultBodyLimit::max(body_limit));

    let app_routes = Router::new()
        .route("/", get(home::root))
        .route("/upload.html", get(home::root))
        .route("/generated.html", get(home::result_page))
        .route("/script.js", get(home::script))
        .route("/style.css", get(home::style))
        .route("/health", get(home::health))
        .merge(api_routes)
        .with_state(state);

    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
        .fallback(home::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
