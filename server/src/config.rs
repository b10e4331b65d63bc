use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{instrument, warn};
use treeconf_resolver::index::is_service_path;
use treeconf_resolver::tree::lookup;
use treeconf_resolver::{SnapshotManager, SymlinkError};

use crate::AppState;

#[instrument(skip(snapshots))]
pub async fn get(
    Path(path): Path<String>,
    State(AppState { snapshots }): State<AppState>,
) -> Result<Response, StatusCode> {
    serve(&snapshots, &path)
}

#[instrument(skip_all)]
pub async fn get_root(
    State(AppState { snapshots }): State<AppState>,
) -> Result<Response, StatusCode> {
    serve(&snapshots, "/")
}

/// Responds with the encoded parameter at `path`, following symlinks along
/// the path. Common parameters are answered from their cached encoding.
///
/// The service directory is refused, whether asked for directly or reached
/// through a symlink.
fn serve(snapshots: &SnapshotManager, path: &str) -> Result<Response, StatusCode> {
    let root = snapshots.current_tree().ok_or_else(|| {
        warn!("no tree published yet");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let requested = normalize(path);
    if is_service_path(&requested) {
        warn!(param.path = %requested, "refusing to serve service directory");
        return Err(StatusCode::FORBIDDEN);
    }

    let node = lookup(root.as_ref(), &requested)
        .map_err(|e| {
            warn!(err=%e, "unable to follow symlink");
            match e {
                SymlinkError::Dangling { .. } => StatusCode::NOT_FOUND,
                SymlinkError::Cycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    if is_service_path(node.path()) {
        warn!(param.path = %requested, target = node.path(), "refusing to serve service directory");
        return Err(StatusCode::FORBIDDEN);
    }

    let bytes = node.to_bytes().map_err(|e| {
        warn!(err=%e, param.path = node.path(), "failed to serialize param");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}

/// "a//b/" and "/a/b" both become "/a/b".
fn normalize(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for component in path.split('/').filter(|c| !c.is_empty()) {
        normalized.push('/');
        normalized.push_str(component);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::normalize;

    #[rstest]
    #[case::root("", "/")]
    #[case::slash("/", "/")]
    #[case::relative("a/b", "/a/b")]
    #[case::messy("//a//b/", "/a/b")]
    fn normalizes(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(expected, normalize(path));
    }
}
