//! Admin API authorization.
//!
//! A single shared credential sent as an HTTP Bearer token and compared by
//! byte equality — no sessions, no expiry, no rotation. The credential comes
//! from configuration, or is generated once and stored at
//! `{data_dir}/admin_token`.

use anyhow::{Context as _, Result};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use std::path::Path;

const TOKEN_FILE: &str = "admin_token";

/// True only when the request carries `Authorization: Bearer <token>` with
/// `<token>` exactly equal to `expected`. Case or whitespace variants fail;
/// an empty expected credential never matches.
pub fn verify_bearer(headers: &HeaderMap, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    match value.strip_prefix("Bearer ") {
        Some(token) => token == expected,
        None => false,
    }
}

/// Uniform 401 body for admin endpoints.
pub fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Unauthorized" })),
    )
}

/// Read the admin credential from `{data_dir}/admin_token`, generating and
/// persisting a fresh one on first run.
pub fn get_or_create_token(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(TOKEN_FILE);
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let token = existing.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let token = uuid::Uuid::new_v4().to_string();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("could not create {}", data_dir.display()))?;
    std::fs::write(&path, &token)
        .with_context(|| format!("could not write {}", path.display()))?;

    // Keep the credential out of other local users' reach.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
    }

    Ok(token)
}

/// Read a previously generated credential without creating one.
pub fn read_token(data_dir: &Path) -> Result<String> {
    let path = data_dir.join(TOKEN_FILE);
    let token = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "could not read admin token from {path}\n  Has the daemon been started at least once?",
            path = path.display()
        )
    })?;
    Ok(token.trim().to_string())
}
