use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rullod::cli::client::{decode_data_url, ApiClient};
use rullod::{
    config::DaemonConfig,
    render::Renderer,
    rest,
    storage::Storage,
    studio::{mime_for_path, RoomImage, StudioState},
    AppContext,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "rullod",
    about = "Rullo Studio host — fabric catalog and AI roller-blind render daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP API port
    #[arg(long, env = "RULLOD_PORT")]
    port: Option<u16>,

    /// Data directory for config, the admin token, and static fabric images
    #[arg(long, env = "RULLOD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RULLOD_LOG")]
    log: Option<String>,

    /// Bind address for the HTTP server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "RULLOD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "RULLOD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Suppress progress and informational output.
    ///
    /// Errors are still printed to stderr. JSON output (--json flags) is
    /// unaffected. Use this flag when piping output to other tools.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    ///
    /// Runs rullod in the foreground.
    ///
    /// Examples:
    ///   rullod serve
    ///   rullod
    Serve,
    /// Create or upgrade the fabric catalog schema, then exit.
    ///
    /// Connects to the configured DATABASE_URL, runs the migrations, and
    /// applies the idempotent column additions. Safe to re-run.
    ///
    /// Examples:
    ///   DATABASE_URL=sqlite://catalog.db rullod init-db
    InitDb,
    /// Show daemon status (running, version, catalog/render availability).
    ///
    /// Connects to the running daemon and prints a summary line.
    /// Exits 0 if healthy, 1 if stopped or unresponsive.
    ///
    /// Examples:
    ///   rullod status
    ///   rullod status --json
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
    /// Manage the admin credential.
    ///
    /// Examples:
    ///   rullod token show
    Token {
        #[command(subcommand)]
        cmd: TokenCmd,
    },
    /// Browse and manage the fabric catalog over the daemon's HTTP API.
    ///
    /// Listing is unauthenticated; add/remove need the admin password
    /// (--password, RULLOD_ADMIN_PASSWORD, or the generated token file).
    ///
    /// Examples:
    ///   rullod fabrics list --fabric-type "Tessuti screen"
    ///   rullod fabrics add --name "Cotone Bianco" --image-url /fabrics/cotone.jpg
    ///   rullod fabrics remove 3
    Fabrics {
        #[command(subcommand)]
        cmd: FabricsCmd,
    },
    /// Generate a roller-blind photomontage for a room photo.
    ///
    /// Drives the full visualizer flow: loads the catalog, selects the
    /// fabric, attaches the room photo, calls the render endpoint, and
    /// writes the produced image next to you.
    ///
    /// Examples:
    ///   rullod render --room soggiorno.jpg --fabric 3
    ///   rullod render --room soggiorno.jpg --fabric https://drive.google.com/file/d/ABC/view -o render.png
    Render {
        /// Path to the room photo (JPEG/PNG/WebP, max 10 MiB)
        #[arg(long)]
        room: std::path::PathBuf,
        /// Catalog fabric id, catalog image URL, or any fabric image URL
        #[arg(long)]
        fabric: String,
        /// Output file (default: render.<ext> from the returned content type)
        #[arg(long, short = 'o')]
        output: Option<std::path::PathBuf>,
    },
}

#[derive(Subcommand)]
enum TokenCmd {
    /// Print the admin credential the daemon accepts.
    ///
    /// Shows the configured password if one is set, otherwise the generated
    /// token stored at {data_dir}/admin_token.
    Show,
}

#[derive(Subcommand)]
enum FabricsCmd {
    /// List the catalog (public endpoint), filtered client-side.
    List {
        /// Only fabrics of this type (exact match; "all" for everything)
        #[arg(long = "fabric-type")]
        fabric_type: Option<String>,
        /// Only fabrics of this color (exact match; "all" for everything)
        #[arg(long)]
        color: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a fabric to the catalog (admin endpoint).
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Image reference: /fabrics/... path, Drive share link, or URL
        #[arg(long = "image-url")]
        image_url: String,
        /// Free-text category, e.g. "Tessuti screen"
        #[arg(long = "fabric-type")]
        fabric_type: Option<String>,
        /// Free-text color family, e.g. "Bianco"
        #[arg(long)]
        color: Option<String>,
        /// Admin password
        #[arg(long, env = "RULLOD_ADMIN_PASSWORD")]
        password: Option<String>,
    },
    /// Remove a fabric by id (admin endpoint; succeeds for unknown ids).
    Remove {
        /// Fabric id to remove
        id: i64,
        /// Admin password
        #[arg(long, env = "RULLOD_ADMIN_PASSWORD")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = std::env::var("RULLOD_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    let quiet = args.quiet;
    match args.command {
        Some(Command::InitDb) => {
            let config = DaemonConfig::new(args.port, args.data_dir, args.log, args.bind_address);
            run_init_db(&config, quiet).await?;
        }
        Some(Command::Status { json }) => {
            let config =
                DaemonConfig::new(args.port, args.data_dir, Some("error".to_string()), args.bind_address);
            let exit_code = run_status(&config, json).await;
            std::process::exit(exit_code);
        }
        Some(Command::Token { cmd }) => {
            let config =
                DaemonConfig::new(args.port, args.data_dir, Some("error".to_string()), args.bind_address);
            match cmd {
                TokenCmd::Show => run_token_show(&config)?,
            }
        }
        Some(Command::Fabrics { cmd }) => {
            let config =
                DaemonConfig::new(args.port, args.data_dir, Some("error".to_string()), args.bind_address);
            run_fabrics(&config, cmd, quiet).await?;
        }
        Some(Command::Render {
            room,
            fabric,
            output,
        }) => {
            let config =
                DaemonConfig::new(args.port, args.data_dir, Some("error".to_string()), args.bind_address);
            run_render(&config, &room, &fabric, output.as_deref(), quiet).await?;
        }
        None | Some(Command::Serve) => {
            run_server(args.port, args.data_dir, args.log, args.bind_address).await?;
        }
    }

    Ok(())
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("rullod.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ── rullod serve ──────────────────────────────────────────────────────────────

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "rullod starting");

    let config = Arc::new(DaemonConfig::new(port, data_dir, log, bind_address));
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        bind = %config.bind_address,
        "config loaded"
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("could not create {}", config.data_dir.display()))?;
    // Static swatch mount — exists even when empty so /fabrics/* 404s cleanly.
    tokio::fs::create_dir_all(config.fabrics_dir()).await?;

    // ── Fabric catalog ───────────────────────────────────────────────────────
    // A missing DATABASE_URL is a supported degraded mode (empty public
    // listing); a configured-but-broken one is logged and degrades the same
    // way rather than taking the render endpoint down with it.
    let storage = match &config.database_url {
        Some(url) => match Storage::connect_with_slow_query(
            url,
            config.observability.slow_query_threshold_ms,
        )
        .await
        {
            Ok(s) => {
                let count = s.count_fabrics().await.unwrap_or(0);
                info!(fabrics = count, "fabric catalog ready");
                Some(Arc::new(s))
            }
            Err(e) => {
                tracing::error!(err = %e, "fabric catalog unavailable — continuing without it");
                None
            }
        },
        None => {
            warn!("DATABASE_URL not configured — fabric catalog disabled");
            None
        }
    };

    // ── Render pipeline ──────────────────────────────────────────────────────
    let renderer = match config.gemini_api_key.clone() {
        Some(key) => {
            let renderer =
                Renderer::new(key, &config.render, config.resolved_public_base_url())?;
            info!(model = %config.render.model, "render pipeline ready");
            Some(Arc::new(renderer))
        }
        None => {
            warn!("GOOGLE_GEMINI_API_KEY not configured — render endpoint disabled");
            None
        }
    };

    // ── Admin credential ─────────────────────────────────────────────────────
    let admin_token = match &config.admin_password {
        Some(p) => p.clone(),
        None => match rest::auth::get_or_create_token(&config.data_dir) {
            Ok(t) => {
                info!("admin token ready (run `rullod token show` to print it)");
                t
            }
            Err(e) => {
                // Without a credential the admin API would be either wide
                // open or dead. This is a startup configuration error.
                eprintln!("FATAL: failed to create admin token: {e:#}");
                std::process::exit(1);
            }
        },
    };

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        storage,
        renderer,
        admin_token,
        started_at: std::time::Instant::now(),
    });

    rest::start_rest_server(ctx).await
}

// ── rullod init-db ────────────────────────────────────────────────────────────

async fn run_init_db(config: &DaemonConfig, quiet: bool) -> Result<()> {
    let url = config.database_url.as_deref().context(
        "DATABASE_URL not configured — set the env var or `database_url` in config.toml",
    )?;

    let storage = Storage::connect(url)
        .await
        .context("could not open the fabric catalog database")?;
    let count = storage.count_fabrics().await?;

    if !quiet {
        println!("Fabric catalog ready ({count} fabrics)");
    }
    Ok(())
}

// ── rullod status ─────────────────────────────────────────────────────────────

fn daemon_base_url(config: &DaemonConfig) -> String {
    // 0.0.0.0 is a bind address, not a destination.
    let host = if config.bind_address == "0.0.0.0" {
        "127.0.0.1"
    } else {
        config.bind_address.as_str()
    };
    format!("http://{host}:{}", config.port)
}

async fn run_status(config: &DaemonConfig, json: bool) -> i32 {
    let client = match ApiClient::new(daemon_base_url(config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e:#}");
            return 1;
        }
    };

    match client.health().await {
        Ok(health) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&health).unwrap_or_default());
            } else {
                println!(
                    "rullod {} — up {}s on port {} (catalog: {}, render: {})",
                    health["version"].as_str().unwrap_or("?"),
                    health["uptime_secs"].as_u64().unwrap_or(0),
                    health["port"].as_u64().unwrap_or(config.port as u64),
                    if health["catalog_configured"].as_bool().unwrap_or(false) {
                        "ok"
                    } else {
                        "disabled"
                    },
                    if health["render_configured"].as_bool().unwrap_or(false) {
                        "ok"
                    } else {
                        "disabled"
                    },
                );
            }
            0
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::json!({ "running": false }));
            } else {
                eprintln!("rullod is not running ({e:#})");
            }
            1
        }
    }
}

// ── rullod token ──────────────────────────────────────────────────────────────

fn run_token_show(config: &DaemonConfig) -> Result<()> {
    match &config.admin_password {
        Some(p) => println!("{p}"),
        None => println!("{}", rest::auth::read_token(&config.data_dir)?),
    }
    Ok(())
}

// ── rullod fabrics ────────────────────────────────────────────────────────────

/// --password > RULLOD_ADMIN_PASSWORD (clap env) > config > token file.
fn resolve_password(config: &DaemonConfig, flag: Option<String>) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p);
    }
    if let Some(p) = &config.admin_password {
        return Ok(p.clone());
    }
    rest::auth::read_token(&config.data_dir)
}

async fn run_fabrics(config: &DaemonConfig, cmd: FabricsCmd, quiet: bool) -> Result<()> {
    let client = ApiClient::new(daemon_base_url(config))?;

    match cmd {
        FabricsCmd::List {
            fabric_type,
            color,
            json,
        } => {
            let mut state = StudioState::new();
            state.set_fabrics(client.list_fabrics().await?);
            if let Some(t) = fabric_type {
                state.set_fabric_type_filter(t);
            }
            if let Some(c) = color {
                state.set_color_filter(c);
            }

            let filtered = state.filtered_fabrics();
            if json {
                println!("{}", serde_json::to_string_pretty(&filtered)?);
            } else if filtered.is_empty() {
                if !quiet {
                    println!("No fabrics.");
                }
            } else {
                for f in filtered {
                    println!(
                        "{:>4}  {:<28} {:<20} {:<16} {}",
                        f.id,
                        f.name,
                        f.fabric_type.as_deref().unwrap_or("-"),
                        f.color.as_deref().unwrap_or("-"),
                        f.image_url,
                    );
                }
            }
        }
        FabricsCmd::Add {
            name,
            image_url,
            fabric_type,
            color,
            password,
        } => {
            let password = resolve_password(config, password)?;
            let token = client.login(&password).await?;
            let fabric = client
                .add_fabric(
                    &token,
                    &name,
                    &image_url,
                    fabric_type.as_deref(),
                    color.as_deref(),
                )
                .await?;
            if !quiet {
                println!("Added fabric {} ({})", fabric.id, fabric.name);
            }
        }
        FabricsCmd::Remove { id, password } => {
            let password = resolve_password(config, password)?;
            let token = client.login(&password).await?;
            client.remove_fabric(&token, id).await?;
            if !quiet {
                println!("Removed fabric {id}");
            }
        }
    }
    Ok(())
}

// ── rullod render ─────────────────────────────────────────────────────────────

async fn run_render(
    config: &DaemonConfig,
    room_path: &std::path::Path,
    fabric: &str,
    output: Option<&std::path::Path>,
    quiet: bool,
) -> Result<()> {
    let client = ApiClient::new(daemon_base_url(config))?;
    let mut state = StudioState::new();

    // Catalog snapshot → selection. A reference that matches nothing in the
    // catalog is still usable as a raw image URL.
    state.set_fabrics(client.list_fabrics().await.unwrap_or_default());
    let fabric_url = if state.select_fabric_where(fabric) {
        let selected = state.selected_fabric().expect("selection just succeeded");
        if !quiet {
            println!("Fabric: {} ({})", selected.name, selected.image_url);
        }
        selected.image_url.clone()
    } else if fabric.parse::<i64>().is_ok() {
        anyhow::bail!("no fabric with id {fabric} in the catalog");
    } else {
        fabric.to_string()
    };

    // Room photo, validated the same way the upload form validates it.
    let bytes = tokio::fs::read(room_path)
        .await
        .with_context(|| format!("could not read {}", room_path.display()))?;
    let file_name = room_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("room.jpg")
        .to_string();
    let room = RoomImage::new(file_name, mime_for_path(room_path), bytes)?;
    state.set_room_image(Some(room));

    if !state.can_generate() {
        anyhow::bail!("select a fabric and attach a room photo first");
    }

    state.set_generating(true);
    state.set_generated_render(None);
    if !quiet {
        println!("Generating render… (this can take a minute or two)");
    }

    let result = client
        .generate_render(state.room_image().expect("room image set above"), &fabric_url)
        .await;
    state.set_generating(false);

    let render_url = result?;
    state.set_generated_render(Some(render_url.clone()));

    let (mime, bytes) = decode_data_url(&render_url)?;
    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => {
            let ext = match mime.as_str() {
                "image/png" => "png",
                "image/webp" => "webp",
                _ => "jpg",
            };
            std::path::PathBuf::from(format!("render.{ext}"))
        }
    };
    tokio::fs::write(&output_path, &bytes)
        .await
        .with_context(|| format!("could not write {}", output_path.display()))?;

    if !quiet {
        println!("Saved {} ({} bytes)", output_path.display(), bytes.len());
    }
    Ok(())
}
