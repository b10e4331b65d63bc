use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use std::net::IpAddr;
use tracing::{instrument, warn};
use treeconf_resolver::snapshot::ClientContext;

use crate::{AppState, AuthenticatedService};

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    /// Defaults to the name of the authenticated service.
    host: Option<String>,
    ip: Option<IpAddr>,
}

#[instrument(skip(snapshots))]
pub async fn get(
    Query(query): Query<ContextQuery>,
    Extension(AuthenticatedService(service)): Extension<AuthenticatedService>,
    State(AppState { snapshots }): State<AppState>,
) -> Result<Json<ClientContext>, StatusCode> {
    let snapshot = snapshots.current().ok_or_else(|| {
        warn!("no tree published yet");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let host = query.host.unwrap_or(service);
    Ok(Json(snapshot.client_context(&host, query.ip.as_ref())))
}
