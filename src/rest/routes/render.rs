// rest/routes/render.rs — POST /api/generate-render.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::AppContext;

type ApiError = (StatusCode, Json<Value>);

/// Multipart form: `roomImage` (file) + `fabricImageUrl` (text).
///
/// Both fields are required and checked before any network call; everything
/// downstream (fabric fetch, model call, image extraction) surfaces as a 500
/// with the underlying message. No retries — a failed render is resubmitted
/// by the caller.
pub async fn generate_render(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut room_bytes: Option<Vec<u8>> = None;
    let mut room_mime = String::new();
    let mut fabric_image_url: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": format!("Malformed form data: {e}") })),
        )
    })? {
        match field.name().unwrap_or_default() {
            "roomImage" => {
                room_mime = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "success": false, "error": format!("Could not read room image: {e}") })),
                    )
                })?;
                room_bytes = Some(bytes.to_vec());
            }
            "fabricImageUrl" => {
                fabric_image_url = field.text().await.ok().filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let (Some(room_bytes), Some(fabric_image_url)) = (room_bytes, fabric_image_url) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Missing required fields" })),
        ));
    };

    let Some(renderer) = ctx.renderer.as_ref() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Render model not configured" })),
        ));
    };

    info!(
        room_bytes = room_bytes.len(),
        fabric_url = %fabric_image_url,
        "render requested"
    );

    match renderer
        .generate(&room_bytes, &room_mime, &fabric_image_url)
        .await
    {
        Ok(render_url) => Ok(Json(json!({ "success": true, "renderUrl": render_url }))),
        Err(e) => {
            error!(err = %e, "render generation failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            ))
        }
    }
}
