// rest/mod.rs — Public HTTP API server.
//
// Axum HTTP server on the configured bind address (local only by default).
//
// Endpoints:
//   POST   /api/admin/auth
//   GET    /api/admin/fabrics
//   POST   /api/admin/fabrics
//   DELETE /api/admin/fabrics
//   GET    /api/fabrics
//   POST   /api/generate-render
//   GET    /api/health
//   GET    /fabrics/*        (static swatch images)

pub mod auth;
pub mod routes;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::AppContext;

/// Room uploads run up to 10 MiB before multipart framing; leave headroom.
const MAX_BODY_BYTES: usize = 12 * 1024 * 1024;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("HTTP API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let fabrics_dir = ctx.config.fabrics_dir();
    Router::new()
        // Health (no auth)
        .route("/api/health", get(routes::health::health))
        // Admin login
        .route("/api/admin/auth", post(routes::admin::login))
        // Admin catalog CRUD
        .route(
            "/api/admin/fabrics",
            get(routes::admin::list_fabrics)
                .post(routes::admin::create_fabric)
                .delete(routes::admin::delete_fabric),
        )
        // Public catalog
        .route("/api/fabrics", get(routes::fabrics::list_fabrics))
        // Render generation
        .route(
            "/api/generate-render",
            post(routes::render::generate_render),
        )
        // Static swatch images ({data_dir}/fabrics)
        .nest_service("/fabrics", ServeDir::new(fabrics_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
