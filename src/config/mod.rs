use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4460;
const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_RENDER_MODEL: &str = "gemini-3-pro-image-preview";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── RenderConfig ─────────────────────────────────────────────────────────────

/// Render pipeline configuration (`[render]` in config.toml).
///
/// The defaults match the generative-image model contract the product ships
/// with; override `api_base_url` to point at a staging endpoint or a local
/// stub during development.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Generative-image model ID.
    pub model: String,
    /// Base URL of the Generative Language API.
    pub api_base_url: String,
    /// Request timeout for one generateContent call, in seconds. The model
    /// can take well over a minute for a photomontage; default: 120.
    pub timeout_secs: u64,
    /// Output aspect ratio requested from the model.
    pub aspect_ratio: String,
    /// Output resolution class requested from the model ("1K", "2K").
    pub image_size: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_RENDER_MODEL.to_string(),
            api_base_url: DEFAULT_GEMINI_API_BASE_URL.to_string(),
            timeout_secs: 120,
            aspect_ratio: "4:3".to_string(),
            image_size: "1K".to_string(),
        }
    }
}

// ─── ObservabilityConfig ─────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP API port (default: 4460).
    port: Option<u16>,
    /// Bind address (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,rullod=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Fabric catalog database URL (e.g. "sqlite:///var/lib/rullod/catalog.db").
    /// Omit to run without a catalog.
    database_url: Option<String>,
    /// Generative-image API key. Omit to disable the render endpoint.
    gemini_api_key: Option<String>,
    /// Public base URL used to resolve relative fabric image paths when
    /// calling the render model (default: "http://{bind_address}:{port}").
    public_base_url: Option<String>,
    /// Shared admin credential for the admin API. Omit to have one generated
    /// and stored at `{data_dir}/admin_token`.
    admin_password: Option<String>,
    /// Render pipeline configuration (`[render]`).
    render: Option<RenderConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Fabric catalog database URL (DATABASE_URL env var).
    /// None means the catalog is unconfigured — the public listing returns
    /// an empty collection and admin catalog operations fail.
    pub database_url: Option<String>,
    /// Generative-image API key (GOOGLE_GEMINI_API_KEY env var).
    /// None disables the render endpoint.
    pub gemini_api_key: Option<String>,
    /// Public base URL for resolving relative fabric image paths
    /// (RULLOD_PUBLIC_BASE_URL env var).
    pub public_base_url: Option<String>,
    /// Shared admin credential (RULLOD_ADMIN_PASSWORD env var).
    /// None means a generated token from `{data_dir}/admin_token` is used.
    pub admin_password: Option<String>,
    /// Render pipeline: model ID, endpoint, timeout, output shape.
    pub render: RenderConfig,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("RULLOD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("RULLOD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.database_url);

        let gemini_api_key = std::env::var("GOOGLE_GEMINI_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.gemini_api_key);

        let public_base_url = std::env::var("RULLOD_PUBLIC_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.public_base_url);

        let admin_password = std::env::var("RULLOD_ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.admin_password);

        let render = toml.render.unwrap_or_default();
        let observability = toml.observability.unwrap_or_default();

        Self {
            port,
            bind_address,
            data_dir,
            log,
            log_format,
            database_url,
            gemini_api_key,
            public_base_url,
            admin_password,
            render,
            observability,
        }
    }

    /// The base URL fabric paths like `/fabrics/lino.jpg` are resolved
    /// against when calling the render model. Falls back to the daemon's own
    /// bind address when no public URL is configured.
    pub fn resolved_public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind_address, self.port),
        }
    }

    /// Directory the static fabric swatch images are served from.
    pub fn fabrics_dir(&self) -> PathBuf {
        self.data_dir.join("fabrics")
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/rullod
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("rullod");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/rullod or ~/.local/share/rullod
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("rullod");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("rullod");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\rullod
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("rullod");
        }
    }
    // Fallback
    PathBuf::from(".rullod")
}
