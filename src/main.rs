use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use cart_rs::{
    handlers::create_app,
    init_observability,
    repositories::{FileCartStore, HttpProductCatalog},
    services::{CartManager, NotifyingCart, TracingNotifier},
    Config, Metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment()?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!(
        "Cart storage: dir={}, key={}",
        config.storage.storage_dir.display(),
        config.storage.storage_key
    );

    let metrics = Arc::new(Metrics::new()?);

    let catalog = Arc::new(HttpProductCatalog::new(
        config.catalog.catalog_base_url.clone(),
        config.catalog.timeout(),
    )?);
    info!("Product catalog at {}", catalog.base_url());

    let store = Arc::new(FileCartStore::new(config.storage.storage_dir.clone()));
    let manager = Arc::new(CartManager::load(
        catalog,
        store,
        config.storage.storage_key.clone(),
    ));
    let cart = Arc::new(NotifyingCart::new(manager, Arc::new(TracingNotifier)));

    let app = create_app(cart, metrics).layer(TimeoutLayer::new(config.server.request_timeout()));

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
