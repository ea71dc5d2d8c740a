//! Fleetgate Gateway - HTTP API in front of the device fleet
//!
//! Startup order: load configuration, open the registry, run one discovery
//! pass over the seed addresses, start the background sweeps, then serve.
//! On Ctrl-C or SIGTERM the server drains, the sweeps stop (an in-flight
//! sweep is allowed to finish) and the registry is flushed.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` to use a mock identity validator that
//! does not need `JWT_SECRET`. Use tokens in format:
//! `test-token:<role>:<user>`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use fleetgate_auth::MockIdentityValidator;
#[cfg(not(feature = "dev-mode"))]
use fleetgate_auth::{AuthConfig, HmacJwtValidator};
use fleetgate_control::{DeviceControlService, ProbeScheduler};
use fleetgate_gateway::{create_router, GatewayConfig, GatewayState};
use fleetgate_store::{DeviceStore, JsonFileStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fleetgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fleetgate Gateway");

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        registry_path = %config.registry_path.display(),
        candidates = config.control.candidate_addresses.len(),
        discovery_interval_secs = config.control.discovery_interval_secs,
        "Gateway configuration loaded"
    );

    // Initialize identity validator
    #[cfg(feature = "dev-mode")]
    let validator = {
        tracing::warn!("DEV MODE ENABLED - using mock identity validator");
        tracing::warn!("Use tokens in format: test-token:<role>:<user>");
        Arc::new(MockIdentityValidator)
    };

    #[cfg(not(feature = "dev-mode"))]
    let validator = Arc::new(HmacJwtValidator::new(AuthConfig::new(
        config.jwt_secret()?,
    )));

    // Open the registry
    let store = Arc::new(JsonFileStore::open(config.registry_path.clone()));
    tracing::info!(devices = store.len(), "Device registry opened");

    let control = Arc::new(DeviceControlService::with_defaults(
        store.clone(),
        config.control.clone(),
    )?);

    // Startup discovery over the seed addresses
    let seeds = control.engine().discover_seeds().await;
    tracing::info!(
        candidates = seeds.results.len(),
        reachable = seeds.reachable(),
        duration_ms = seeds.duration_ms,
        "Startup discovery complete"
    );

    let scheduler = ProbeScheduler::start(control.engine(), control.sweep_schedule());

    let listen_addr = config.listen_addr.clone();
    let state = GatewayState::new(control, validator, config);
    let app = create_router(state);

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    scheduler.shutdown().await;
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush device registry");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
