//! REST API tests.
//!
//! Each test binds the full router on a random local port (the same harness
//! shape the daemon uses) and talks to it over real HTTP.

use rullod::{
    config::{DaemonConfig, ObservabilityConfig, RenderConfig},
    rest,
    storage::Storage,
    AppContext,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

const ADMIN_PASSWORD: &str = "momo123";

struct TestApp {
    base_url: String,
    http: reqwest::Client,
    // Keeps the data dir (and the SQLite file inside it) alive.
    _dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Bind the router on 127.0.0.1:0 with an optional catalog and no renderer.
async fn spawn_app(with_catalog: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let storage = if with_catalog {
        let url = format!("sqlite://{}/catalog.db?mode=rwc", dir.path().display());
        Some(Arc::new(Storage::connect(&url).await.unwrap()))
    } else {
        None
    };

    let config = Arc::new(DaemonConfig {
        port: addr.port(),
        bind_address: "127.0.0.1".to_string(),
        data_dir: dir.path().to_path_buf(),
        log: "error".to_string(),
        log_format: "pretty".to_string(),
        database_url: None,
        gemini_api_key: None,
        public_base_url: None,
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        render: RenderConfig::default(),
        observability: ObservabilityConfig::default(),
    });

    let ctx = Arc::new(AppContext {
        config,
        storage,
        renderer: None,
        admin_token: ADMIN_PASSWORD.to_string(),
        started_at: std::time::Instant::now(),
    });

    let router = rest::build_router(ctx);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        http: reqwest::Client::new(),
        _dir: dir,
    }
}

// ─── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_status_without_secrets() {
    let app = spawn_app(true).await;

    let resp = app.http.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"].as_str().unwrap(), env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_secs"].is_number());
    assert_eq!(body["catalog_configured"], true);
    assert_eq!(body["render_configured"], false);
    assert!(body.get("admin_token").is_none());
}

// ─── Admin auth ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_exchanges_password_for_token() {
    let app = spawn_app(true).await;

    let resp = app
        .http
        .post(app.url("/api/admin/auth"))
        .json(&json!({ "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["token"], ADMIN_PASSWORD);

    let resp = app
        .http
        .post(app.url("/api/admin/auth"))
        .json(&json!({ "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid password");
}

#[tokio::test]
async fn admin_endpoints_require_the_exact_bearer_value() {
    let app = spawn_app(true).await;

    // No header at all.
    let resp = app
        .http
        .get(app.url("/api/admin/fabrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Near misses: case and whitespace variants must all fail.
    for bad in ["MOMO123", "momo123 ", " momo123", "Momo123"] {
        let resp = app
            .http
            .get(app.url("/api/admin/fabrics"))
            .header("Authorization", format!("Bearer {bad}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401, "bearer {bad:?} must be rejected");
    }

    // The exact value passes.
    let resp = app
        .http
        .get(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// ─── Catalog CRUD ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fabric_crud_round_trip() {
    let app = spawn_app(true).await;

    // Insert echoes the submitted values plus generated id/timestamp.
    let resp = app
        .http
        .post(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .json(&json!({
            "name": "Cotone Bianco",
            "imageUrl": "https://drive.google.com/file/d/ABC123/view",
            "fabricType": "Tessuti screen",
            "color": "Bianco",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    let fabric = &body["fabric"];
    assert_eq!(fabric["name"], "Cotone Bianco");
    assert_eq!(fabric["imageUrl"], "https://drive.google.com/file/d/ABC123/view");
    assert_eq!(fabric["fabricType"], "Tessuti screen");
    assert_eq!(fabric["color"], "Bianco");
    assert!(fabric["id"].as_i64().unwrap() > 0);
    assert!(fabric["createdAt"].is_string());
    let id = fabric["id"].as_i64().unwrap();

    // Admin listing keeps nulls for a second, bare fabric.
    app.http
        .post(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .json(&json!({ "name": "Lino", "imageUrl": "/fabrics/lino.jpg" }))
        .send()
        .await
        .unwrap();
    let body: Value = app
        .http
        .get(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let fabrics = body["fabrics"].as_array().unwrap();
    assert_eq!(fabrics.len(), 2);
    // Newest first.
    assert_eq!(fabrics[0]["name"], "Lino");
    assert!(fabrics[0]["fabricType"].is_null());

    // Public listing maps absent optionals to empty strings.
    let public: Value = app
        .http
        .get(app.url("/api/fabrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = public.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["fabricType"], "");
    assert_eq!(list[0]["color"], "");
    assert_eq!(list[1]["fabricType"], "Tessuti screen");

    // Delete, then delete again — both report success.
    for _ in 0..2 {
        let resp = app
            .http
            .delete(app.url("/api/admin/fabrics"))
            .bearer_auth(ADMIN_PASSWORD)
            .json(&json!({ "id": id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
    }

    let public: Value = app
        .http
        .get(app.url("/api/fabrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn insert_validates_required_fields() {
    let app = spawn_app(true).await;

    for body in [
        json!({ "imageUrl": "/fabrics/x.jpg" }),
        json!({ "name": "Lino" }),
        json!({ "name": "", "imageUrl": "/fabrics/x.jpg" }),
        json!({ "name": "Lino", "imageUrl": "" }),
    ] {
        let resp = app
            .http
            .post(app.url("/api/admin/fabrics"))
            .bearer_auth(ADMIN_PASSWORD)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "body {body} must be rejected");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Name and imageUrl are required");
    }
}

#[tokio::test]
async fn delete_requires_an_id() {
    let app = spawn_app(true).await;

    let resp = app
        .http
        .delete(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "ID is required");
}

// ─── Degraded catalog ─────────────────────────────────────────────────────────

#[tokio::test]
async fn public_listing_is_empty_when_catalog_unconfigured() {
    let app = spawn_app(false).await;

    let resp = app.http.get(app.url("/api/fabrics")).send().await.unwrap();
    assert_eq!(resp.status(), 200, "degraded mode must not be an error");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));

    // Admin catalog operations fail loudly instead.
    let resp = app
        .http
        .get(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

// ─── Render endpoint validation ───────────────────────────────────────────────

#[tokio::test]
async fn render_rejects_missing_fields_before_anything_else() {
    // No renderer configured: if validation ran after pipeline setup this
    // would be a 500, so the 400 proves the field check comes first.
    let app = spawn_app(false).await;

    // Room image only.
    let form = reqwest::multipart::Form::new().part(
        "roomImage",
        reqwest::multipart::Part::bytes(vec![0u8; 8])
            .file_name("room.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let resp = app
        .http
        .post(app.url("/api/generate-render"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Missing required fields");

    // Fabric URL only.
    let form = reqwest::multipart::Form::new().text("fabricImageUrl", "/fabrics/lino.jpg");
    let resp = app
        .http
        .post(app.url("/api/generate-render"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn render_fails_cleanly_when_model_unconfigured() {
    let app = spawn_app(false).await;

    let form = reqwest::multipart::Form::new()
        .part(
            "roomImage",
            reqwest::multipart::Part::bytes(vec![0u8; 8])
                .file_name("room.jpg")
                .mime_str("image/jpeg")
                .unwrap(),
        )
        .text("fabricImageUrl", "/fabrics/lino.jpg");
    let resp = app
        .http
        .post(app.url("/api/generate-render"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Render model not configured");
}

// ─── End-to-end catalog property ──────────────────────────────────────────────

#[tokio::test]
async fn inserted_drive_link_normalizes_from_the_listing() {
    let app = spawn_app(true).await;

    app.http
        .post(app.url("/api/admin/fabrics"))
        .bearer_auth(ADMIN_PASSWORD)
        .json(&json!({
            "name": "Cotone Bianco",
            "imageUrl": "https://drive.google.com/file/d/ABC123/view",
            "fabricType": "Tessuti screen",
            "color": "Bianco",
        }))
        .send()
        .await
        .unwrap();

    let public: Value = app
        .http
        .get(app.url("/api/fabrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = &public.as_array().unwrap()[0];
    assert_eq!(entry["name"], "Cotone Bianco");
    assert_eq!(
        rullod::render::urls::convert_google_drive_url(entry["imageUrl"].as_str().unwrap()),
        "https://drive.google.com/uc?export=view&id=ABC123"
    );
}
