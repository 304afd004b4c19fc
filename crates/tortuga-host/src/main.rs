use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use tortuga_host::config::{AuthConfig, AuthMode, HostConfig};
use tortuga_host::http::{self, HttpState};
use tortuga_store::{DynEventLog, FsEventLog};

#[derive(Parser, Debug)]
#[command(name = "tortugad", version, about = "Tortuga fleet control server")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 13337)]
    port: u16,

    /// Root directory served via /files and /api/tree.
    #[arg(long, env = "TORTUGA_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,

    /// Event log directory (defaults to <base-dir>/data).
    #[arg(long, env = "TORTUGA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Frontend assets directory (defaults to <base-dir>/static).
    #[arg(long, env = "TORTUGA_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Authorization mode: "token" or "none".
    #[arg(long, env = "KARI_AUTH", default_value = "token")]
    auth_mode: String,

    /// Shared device token; empty disables token checks.
    #[arg(long, env = "KARI_TOKEN")]
    token: Option<String>,

    /// Allow unauthenticated requests from private/tailnet addresses.
    #[arg(long, env = "ALLOW_PRIVATE", default_value_t = true, action = clap::ArgAction::Set)]
    allow_private: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let base_dir = cli.base_dir;
    let config = HostConfig {
        bind: SocketAddr::from(([0, 0, 0, 0], cli.port)),
        data_dir: cli.data_dir.unwrap_or_else(|| base_dir.join("data")),
        static_dir: cli.static_dir.unwrap_or_else(|| base_dir.join("static")),
        auth: AuthConfig {
            mode: AuthMode::parse(&cli.auth_mode),
            token: cli.token.map(|token| token.trim().to_string()),
            allow_private: cli.allow_private,
        },
        base_dir,
    };
    tracing::info!(
        auth_mode = ?config.auth.mode,
        allow_private = config.auth.allow_private,
        token_set = config.auth.token_set(),
        base_dir = %config.base_dir.display(),
        "booting"
    );

    let log: DynEventLog = Arc::new(FsEventLog::open(&config.data_dir)?);
    let bind = config.bind;
    let state = HttpState::new(config, log);
    let (shutdown_tx, _) = broadcast::channel(1);
    let server = http::spawn_http_server(bind, http::router(state), shutdown_tx.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(());
    server.await?;
    Ok(())
}
