use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pictor_capability::compose::LocalComposer;
use pictor_capability::design::DesignClient;
use pictor_capability::render::RenderClient;
use pictor_capability::safety::TermFilter;
use pictor_capability::store::OssStore;
use pictor_capability::Capabilities;
use pictor_pipeline::AdmissionGate;
use pictor_registry::{spawn_sweeper, JobRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pictor_api::config::{ServerConfig, UpstreamConfig};
use pictor_api::router::build_app_router;
use pictor_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pictor_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Capabilities ---
    let upstream = UpstreamConfig::from_env();
    let capabilities = build_capabilities(&upstream);

    // --- Registry + admission gate ---
    let registry = JobRegistry::new();
    let gate = AdmissionGate::new(registry.clone(), capabilities, config.generation());

    // --- Retention sweeper ---
    let sweeper_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper_handle = spawn_sweeper(registry.clone(), config.retention(), sweeper_cancel.clone());
    tracing::info!("Retention sweeper started");

    // --- App state + router ---
    let state = AppState {
        gate,
        registry,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    tracing::info!("Retention sweeper stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wire the capability adapters.
///
/// With a design API key configured, all upstreams are real. Without one,
/// the offline stubs stand in so the server still runs end to end in
/// local development (the term filter is always the real one).
fn build_capabilities(upstream: &UpstreamConfig) -> Capabilities {
    let Some(ref design_api_key) = upstream.design_api_key else {
        tracing::warn!("DESIGN_API_KEY not set, using offline stub capabilities");
        return pictor_capability::stub::stub_capabilities();
    };

    let design = Arc::new(DesignClient::new(
        upstream.design_api_url.clone(),
        design_api_key.clone(),
    ));

    Capabilities {
        safety: Arc::new(TermFilter::new()),
        analyzer: design.clone(),
        proposer: design.clone(),
        optimizer: design,
        renderer: Arc::new(RenderClient::new(
            upstream.render_api_url.clone(),
            upstream.render_api_key.clone(),
        )),
        composer: Arc::new(LocalComposer::default()),
        store: Arc::new(OssStore::new(
            upstream.oss_endpoint.clone(),
            upstream.oss_prefix.clone(),
            upstream.oss_token.clone(),
        )),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
