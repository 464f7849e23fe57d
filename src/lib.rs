pub mod cli;
pub mod config;
pub mod gemini;
pub mod render;
pub mod rest;
pub mod storage;
pub mod studio;

use std::sync::Arc;

use config::DaemonConfig;
use render::Renderer;
use storage::Storage;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<DaemonConfig>,
    /// Fabric catalog. `None` when no `database_url` is configured — the
    /// public listing then degrades to an empty catalog and admin catalog
    /// operations fail with a store error.
    pub storage: Option<Arc<Storage>>,
    /// Render pipeline. `None` when no generative-model API key is
    /// configured; the render endpoint then fails after input validation.
    pub renderer: Option<Arc<Renderer>>,
    /// Shared admin credential. Every admin request must present this exact
    /// value as an HTTP Bearer token; compared by byte equality only.
    pub admin_token: String,
    pub started_at: std::time::Instant,
}
