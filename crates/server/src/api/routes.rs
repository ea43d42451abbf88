use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{download, handlers, middleware::metrics_middleware, search};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Search and relay
        .route("/search", get(search::search))
        .route("/torrproxy/download", get(download::download))
        // Health, config and introspection
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/indexers", get(handlers::list_indexers))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
