use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use models::Settings;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;

/// Uploads are whole workbooks; axum's 2 MB default is too small.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Create the main application router with all API endpoints
pub fn create_router(settings: Arc<Settings>) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/process", post(handlers::process_upload))
        .with_state(settings)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
