use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use keystone_api::app::{build_app, services::AppServices};
use keystone_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    keystone_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialise services")?;
    services
        .bootstrap(&config)
        .await
        .context("failed to bootstrap super admin")?;

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
