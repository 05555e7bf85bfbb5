//! Main entry point for the Service Gateway

use service_gateway::{
    api,
    config::{LoggingConfig, Settings},
    exposure::{self, ExposureManager},
    AppState,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    init_tracing(&settings.logging);
    settings.validate()?;

    info!(
        host = %settings.server.host,
        port = settings.server.port,
        ttl_secs = settings.registry.ttl_secs,
        exposure = %settings.exposure.provider,
        "Starting Service Gateway"
    );

    let exposure = exposure::from_config(&settings.exposure)?;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let app_state = Arc::new(AppState::new(settings)?);
    app_state.start_sweeper();

    let app = api::routes::create_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();
    info!("Server listening on {}", addr);

    // Exposure failure is fatal
    let public_url = exposure.connect(port).await.map_err(|e| {
        error!(error = %e, provider = exposure.name(), "Failed to expose gateway");
        e
    })?;
    info!(public_url = %public_url, "Gateway is publicly reachable");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(exposure.clone()))
        .await?;

    app_state.stop_sweeper();
    info!("Gateway shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

/// Resolves on SIGINT/SIGTERM once the tunnel is torn down, which lets axum
/// close the listener afterwards.
async fn shutdown_signal(exposure: Arc<dyn ExposureManager>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, shutting down");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down");
        }
    }

    if let Err(e) = exposure.disconnect().await {
        error!(error = %e, provider = exposure.name(), "Failed to disconnect exposure");
    }
}
