use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use courseset_api::clients::catalog::HttpCatalogClient;
use courseset_api::clients::payments::StripeGateway;
use courseset_api::config::{init_tracing, load_config};
use courseset_api::events;
use courseset_api::services::fulfillment::LoggingFulfillment;
use courseset_api::services::AppServices;
use courseset_api::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);
    info!(
        environment = %config.environment,
        "Starting courseset-api"
    );

    let (event_sender, event_receiver) = events::channel(1000);
    tokio::spawn(events::process_events(event_receiver));

    let catalog = Arc::new(HttpCatalogClient::new(&config));
    let gateway = Arc::new(StripeGateway::new(&config).context("payment gateway setup failed")?);
    let backend = Arc::new(LoggingFulfillment);

    let services = AppServices::new(&config, catalog, gateway, backend, event_sender.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port configuration")?;

    let state = AppState {
        config: Arc::new(config),
        services,
        event_sender,
    };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
