use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use data_encoding::{BASE64, HEXLOWER};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use treeconf_resolver::SnapshotManager;

use crate::AppState;

/// The service a request was authenticated as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedService(pub String);

/// Rejects requests without valid service credentials. The credential hash
/// is read from the currently published tree.
pub async fn require_service(
    State(AppState { snapshots }): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if snapshots.current().is_none() {
        warn!("no tree published yet");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match authenticate(&snapshots, request.headers()) {
        Some(service) => {
            request
                .extensions_mut()
                .insert(AuthenticatedService(service));
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"treeconf\"")],
        )
            .into_response(),
    }
}

fn authenticate(snapshots: &SnapshotManager, headers: &HeaderMap) -> Option<String> {
    let Some((service, password)) = parse_basic(headers) else {
        debug!("missing or malformed credentials");
        return None;
    };

    let Some(stored) = snapshots.lookup_service_credential(&service) else {
        warn!(service = %service, "unknown service");
        return None;
    };

    if !verify_password(&stored, &password) {
        warn!(service = %service, "password mismatch");
        return None;
    }

    Some(service)
}

/// Compares hex(sha256(password)) with a stored lowercase hex hash, in
/// constant time.
fn verify_password(stored: &[u8], password: &str) -> bool {
    let digest = HEXLOWER.encode(&Sha256::digest(password.as_bytes()));
    digest.as_bytes().ct_eq(stored).into()
}

/// Extracts `(user, password)` from a Basic Authorization header.
fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = String::from_utf8(BASE64.decode(encoded.as_bytes()).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;

    Some((user.to_string(), password.to_string()))
}
