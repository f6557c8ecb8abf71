use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::signal;
use tracing::info;

use fleet_orchestrator::{
    config::Config,
    fleet::{FleetManager, HostRegistry},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    // This avoids needing any external tool (curl/wget) in the container image.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_orchestrator=info,tower_http=warn".into()),
        )
        .init();

    let config_path = std::env::var("FLEET_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/fleet-orchestrator/config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(hosts = config.hosts.len(), port = config.server.port, "fleet orchestrator starting");

    let request_timeout = Duration::from_secs(config.inception.timeout_secs);
    let config = Arc::new(config);
    let registry = Arc::new(HostRegistry::new(config.hosts.clone(), request_timeout));
    let fleet = Arc::new(FleetManager::new(registry));

    // Warm the fleet cache before serving so the first `ask`/`hosts` call
    // doesn't pay for a cold probe.
    let initial_statuses = fleet.check_all_hosts().await;
    let online = initial_statuses.iter().filter(|s| s.online).count();
    info!(online, total = initial_statuses.len(), "initial fleet probe complete");

    let state = Arc::new(AppState::new(Arc::clone(&config), Arc::clone(&fleet)));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "tool server listening");

    let app = fleet_orchestrator::api::router(state).layer(axum::middleware::from_fn(
        fleet_orchestrator::api::request_id::request_id_middleware,
    )).layer(
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
            .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO)),
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("tool server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
/// Invoked via `fleet-orchestrator --healthcheck` from a Docker HEALTHCHECK.
async fn healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("FLEET_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(8090);

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
