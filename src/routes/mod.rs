//! Router assembly: HTTP endpoints, static files, CORS, body limits and HTTP tracing.

use std::{path::Path, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Uploaded study material (PDF/DOCX) can be larger than axum's 2 MB default.
const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Build the application router with:
/// - auth under `/api/auth/...`
/// - quiz/result/question endpoints at the paths the SPA already calls
/// - static SPA from the configured directory with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.settings.static_dir.clone();
    let static_service = ServeDir::new(&static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(Path::new(&static_dir).join("index.html")));

    Router::new()
        .route("/api/health", get(http::http_health))
        // Auth
        .route("/api/auth/register", post(http::http_register))
        .route("/api/auth/login", post(http::http_login))
        // Quizzes
        .route("/save-quiz", post(http::http_save_quiz))
        .route("/save-questions", post(http::http_save_questions))
        .route("/api/assessments", get(http::http_list_assessments))
        .route("/api/user-questions", get(http::http_user_questions))
        .route("/api/user-questions/:id", delete(http::http_delete_user_question))
        // Results
        .route("/api/results", post(http::http_save_result).get(http::http_results_for_student))
        .route("/api/results/by-assessment", get(http::http_results_for_assessment))
        // Evaluation + generation + upload
        .route("/evaluate-answer", post(http::http_evaluate_answer))
        .route("/generate-question", post(http::http_generate_question))
        .route("/api/questions/generate", post(http::http_generate))
        .route(
            "/api/questions/upload",
            post(http::http_upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
