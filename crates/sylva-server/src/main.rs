use std::path::PathBuf;

use clap::Parser;
use sylva_server::gateway::Gateway;
use sylva_server::{ServerConfig, ServerContext};
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sylva-server", about = "CST analysis and mutation server")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the socket path derived from the store filename.
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> sylva_error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;
    let socket_path = cli.socket.unwrap_or_else(|| config.socket_path());

    std::fs::create_dir_all(&config.socket_dir)
        .map_err(|e| sylva_error::Error::file_op("mkdir", &config.socket_dir, e))?;
    std::fs::create_dir_all(&config.backup_dir)
        .map_err(|e| sylva_error::Error::file_op("mkdir", &config.backup_dir, e))?;

    let ctx = ServerContext::bootstrap(config)?;

    // Integrity check on open. A frozen store still serves the recovery
    // allow-list, so detection is logged rather than fatal.
    if let Err(e) = ctx.gate.check(&ctx.store).await {
        tracing::error!("store failed the integrity check on open: {e}");
    }

    if socket_path.exists() {
        std::fs::remove_file(&socket_path)
            .map_err(|e| sylva_error::Error::file_op("unlink", &socket_path, e))?;
    }
    let listener = UnixListener::bind(&socket_path)
        .map_err(|e| sylva_error::Error::file_op("bind", &socket_path, e))?;
    tracing::info!(socket = %socket_path.display(), "listening");

    let gateway = Gateway::new(ctx);
    tokio::select! {
        _ = gateway.run(listener) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
