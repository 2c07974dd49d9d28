//! Agri Relay server binary.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agri_relay::adapters::{app_router, HttpTelemetrySink, Relay, RelaySettings, TelemetryForwarder};
use agri_relay::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.server);

    let forwarder = match config.forwarder.url.as_deref() {
        Some(url) if config.forwarder.is_enabled() => {
            let mut sink = HttpTelemetrySink::new(url, config.forwarder.timeout())?;
            if let Some(status_url) = config.forwarder.status_url() {
                sink = sink.with_status_url(status_url);
            }
            tracing::info!(
                url = %sink.url(),
                status_url = ?sink.status_url(),
                "Telemetry forwarding enabled"
            );
            Some(TelemetryForwarder::new(Arc::new(sink)))
        }
        _ => {
            tracing::info!("Telemetry forwarding disabled");
            None
        }
    };

    let (relay, relay_task) = Relay::spawn(RelaySettings::from(&config.relay), forwarder);
    let app = app_router(relay, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Agri relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Upgraded sockets may still hold handles, so stop the loop explicitly.
    relay_task.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = ctrl_c() => {},
            _ = terminate() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::warn!(?err, "Failed to install Ctrl+C handler");
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => tracing::warn!(?err, "Failed to install SIGTERM handler"),
    }
}
