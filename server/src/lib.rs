use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use treeconf_resolver::SnapshotManager;

mod auth;
mod config;
mod context;
mod health;

pub use auth::AuthenticatedService;

#[derive(Clone)]
pub struct AppState {
    snapshots: Arc<SnapshotManager>,
}

impl AppState {
    pub fn new(snapshots: Arc<SnapshotManager>) -> Self {
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &Arc<SnapshotManager> {
        &self.snapshots
    }
}

/// Builds the HTTP surface. Everything below `/client` requires a service to
/// authenticate with its credentials from the published tree.
pub fn gen_router(state: AppState) -> Router {
    let client = Router::new()
        .route("/config", get(config::get_root))
        .route("/config/*path", get(config::get))
        .route("/context", get(context::get))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_service,
        ));

    Router::new()
        .nest("/client", client)
        .route("/healthz", get(health::get))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
