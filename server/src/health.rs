use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    generation: u64,
    mtime: String,
}

pub async fn get(
    State(AppState { snapshots }): State<AppState>,
) -> Result<Json<Health>, (StatusCode, &'static str)> {
    let snapshot = snapshots
        .current()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "no tree loaded"))?;

    Ok(Json(Health {
        generation: snapshot.generation(),
        mtime: snapshot.mtime().to_string(),
    }))
}
