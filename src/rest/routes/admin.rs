// rest/routes/admin.rs — Password-gated catalog CRUD.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::rest::auth;
use crate::storage::{FabricRow, Storage};
use crate::AppContext;

type ApiError = (StatusCode, Json<Value>);

fn store_error(msg: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": msg })),
    )
}

/// The admin read shape: optional fields stay `null` when unset.
fn fabric_json(row: &FabricRow) -> Value {
    json!({
        "id": row.id,
        "name": row.name,
        "imageUrl": row.image_url,
        "fabricType": row.fabric_type,
        "color": row.color,
        "createdAt": row.created_at,
    })
}

/// The catalog store, or a uniform 500 when no database is configured.
fn catalog(ctx: &AppContext) -> Result<&Arc<Storage>, ApiError> {
    ctx.storage
        .as_ref()
        .ok_or_else(|| store_error("Database not configured"))
}

// ─── POST /api/admin/auth ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Exchange the shared password for the bearer value. The "token" is the
/// password itself — a flat equality credential, documented as such.
pub async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    if !ctx.admin_token.is_empty() && body.password == ctx.admin_token {
        return Ok(Json(json!({ "success": true, "token": ctx.admin_token })));
    }
    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Invalid password" })),
    ))
}

// ─── GET /api/admin/fabrics ───────────────────────────────────────────────────

pub async fn list_fabrics(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_bearer(&headers, &ctx.admin_token) {
        return Err(auth::unauthorized());
    }

    let storage = catalog(&ctx)?;
    match storage.list_fabrics().await {
        Ok(rows) => {
            let fabrics: Vec<Value> = rows.iter().map(fabric_json).collect();
            Ok(Json(json!({ "success": true, "fabrics": fabrics })))
        }
        Err(e) => {
            error!(err = %e, "admin fabric listing failed");
            Err(store_error("Failed to fetch fabrics"))
        }
    }
}

// ─── POST /api/admin/fabrics ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFabricRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub fabric_type: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

pub async fn create_fabric(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<CreateFabricRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_bearer(&headers, &ctx.admin_token) {
        return Err(auth::unauthorized());
    }

    let name = body.name.as_deref().unwrap_or("");
    let image_url = body.image_url.as_deref().unwrap_or("");
    if name.is_empty() || image_url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Name and imageUrl are required" })),
        ));
    }

    let storage = catalog(&ctx)?;
    match storage
        .create_fabric(
            name,
            image_url,
            body.fabric_type.as_deref(),
            body.color.as_deref(),
        )
        .await
    {
        Ok(row) => Ok(Json(json!({ "success": true, "fabric": fabric_json(&row) }))),
        Err(e) => {
            error!(err = %e, "fabric insert failed");
            Err(store_error("Failed to add fabric"))
        }
    }
}

// ─── DELETE /api/admin/fabrics ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct DeleteFabricRequest {
    #[serde(default)]
    pub id: Option<i64>,
}

/// Idempotent: deleting an id that never existed still reports success.
pub async fn delete_fabric(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<DeleteFabricRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_bearer(&headers, &ctx.admin_token) {
        return Err(auth::unauthorized());
    }

    let Some(id) = body.id else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "ID is required" })),
        ));
    };

    let storage = catalog(&ctx)?;
    match storage.delete_fabric(id).await {
        Ok(()) => Ok(Json(json!({ "success": true }))),
        Err(e) => {
            error!(err = %e, id, "fabric delete failed");
            Err(store_error("Failed to delete fabric"))
        }
    }
}
