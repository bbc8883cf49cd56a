use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use corpreg_api::{
    app::{build_router, build_state},
    config::Config,
    middleware::RequestScope,
};

#[derive(Debug, Parser)]
#[command(name = "corpreg-api", about = "Companies registry HTTP service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Server,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Server) {
        Command::Server => serve().await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    corpreg_observability::init(corpreg_observability::LogFormat::for_mode(config.dev_mode));
    corpreg_observability::install_panic_hook();
    if config.dev_mode {
        warn!("DEVELOPMENT_MODE is on; region restrictions are not enforced");
    }

    let state = build_state(&config).await?;
    let companies = state.companies.clone();
    let app = build_router(state, RequestScope::new(config.request_timeout));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("server stopped; closing event log and database");
    companies.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
