use axum::Router;
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

use wfspep::{
    api,
    config::Config,
    services::{PepService, upstream},
    wfs::FilterPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wfspep=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");

    let upstream = upstream::from_config(&config.upstream)?;
    let service = Arc::new(PepService::new(
        upstream,
        FilterPolicy::from(&config.filter),
    ));

    tracing::info!(
        mode = ?config.upstream.mode,
        path = %config.wfs_path,
        identity_header = %config.identity_header,
        "Starting WFS policy enforcement proxy on {}:{}",
        config.host,
        config.port
    );

    let app = build_router(&config, service)?;

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(config: &Config, service: Arc<PepService>) -> anyhow::Result<Router> {
    Ok(api::router(config, service)?
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http()))
}
