//! Router assembly

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.settings.storage.base_path);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/runs", post(handlers::start_run))
        .route("/v1/runs/:id", get(handlers::get_run))
        .route("/v1/runs/:id/resume", post(handlers::resume_run))
        .route("/v1/runs/:id/cancel", post(handlers::cancel_run))
        .route("/v1/sets/:id/generate", post(handlers::generate_set))
        .route("/v1/sets/:id/repair", post(handlers::repair))
        .route("/v1/cron/tick", post(handlers::cron_tick))
        .nest_service("/assets", assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
