//! delve-api - HTTP API server for the delve research service

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delve_api::{router, AppState, ServerConfig};
use delve_pipeline::{HttpBlobStore, InMemoryStore, ReportStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delve_api=info,delve_pipeline=info,delve_inference=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    let store: Arc<dyn ReportStore> = match HttpBlobStore::from_env() {
        Ok(store) => Arc::new(store),
        Err(_) => {
            warn!("BLOB_BASE_URL not set, falling back to the in-memory report store");
            Arc::new(InMemoryStore::new())
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, store)?;

    info!("delve-api listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
