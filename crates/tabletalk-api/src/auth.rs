//! Bearer-token authentication for protected routes.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Random 32-character hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Read the token at `path`, or create one there (owner-only on unix).
pub fn load_or_generate_token(path: &Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(path) {
        let token = contents.trim();
        if !token.is_empty() {
            tracing::info!(path = %path.display(), "API token loaded");
            return token.to_string();
        }
    }

    let token = generate_token();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(path, &token) {
        Ok(()) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
            }
            tracing::info!(path = %path.display(), "API token saved");
        }
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to save API token"),
    }
    token
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get("authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;
    value.strip_prefix("Bearer ").ok_or("Invalid bearer token")
}

/// Middleware rejecting requests without `Authorization: Bearer <api_token>`.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let rejection = match bearer_token(req.headers()) {
        Ok(token) if token == state.api_token => None,
        Ok(_) => Some("Invalid bearer token"),
        Err(message) => Some(message),
    };
    match rejection {
        None => next.run(req).await,
        Some(message) => unauthorized(message),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("unauthorized", message)),
    )
        .into_response()
}
