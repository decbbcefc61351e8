mod catalog;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use catalog::Catalog;
use config::AppConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("till_api=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting till-api with config: {:?}", config);

    let catalog = Catalog::open(&config.db_path).await?;
    let state = AppState::new(config, catalog);
    let bind_addr = state.config.bind_addr.clone();
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("till-api listening on {}", bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
