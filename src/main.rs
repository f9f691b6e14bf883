use anyhow::Context;
use lobbychat::{AppState, backend, config::ServerConfig, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info,tower_http=debug")?;
    let config = ServerConfig::from_env()?;

    let db_pool = backend::db::connect(&config.database_url, config.max_connections())
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let app = backend::router(AppState { db_pool });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, database = %config.database_url, "collection store listening");
    axum::serve(listener, app).await?;
    Ok(())
}
