//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index::index))
        .route("/health", get(handlers::health::health_check))
        .route("/sse", get(handlers::sse::subscribe))
        .route("/messages", post(handlers::messages::handle_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
