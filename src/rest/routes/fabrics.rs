// rest/routes/fabrics.rs — Unauthenticated catalog read.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

use crate::AppContext;

/// GET /api/fabrics — the full catalog, newest first.
///
/// Availability beats correctness signaling here: with no database
/// configured the UI should show "no fabrics", not an error page, so the
/// unconfigured case returns an empty array. Absent type/color come back as
/// empty strings, which is what the filter UI expects.
pub async fn list_fabrics(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(storage) = ctx.storage.as_ref() else {
        debug!("catalog not configured — returning empty fabric list");
        return Ok(Json(json!([])));
    };

    match storage.list_fabrics().await {
        Ok(rows) => {
            let fabrics: Vec<Value> = rows
                .iter()
                .map(|row| {
                    json!({
                        "id": row.id,
                        "name": row.name,
                        "imageUrl": row.image_url,
                        "fabricType": row.fabric_type.clone().unwrap_or_default(),
                        "color": row.color.clone().unwrap_or_default(),
                        "createdAt": row.created_at,
                    })
                })
                .collect();
            Ok(Json(json!(fabrics)))
        }
        Err(e) => {
            error!(err = %e, "public fabric listing failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "Failed to load fabrics" })),
            ))
        }
    }
}
