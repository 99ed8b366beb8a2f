use std::net::SocketAddr;
use std::sync::Arc;
use stormquery_core::ServiceConfig;
use stormquery_remote::{ArcGisClient, FeatureQueryService, FeatureService, InMemoryFeatureService};
use stormquery_server::{router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::load()?;
    let service: Arc<dyn FeatureService> = match std::env::var("STORMQUERY_FIXTURE") {
        Ok(path) => {
            info!(fixture = %path, "serving from fixture file");
            Arc::new(InMemoryFeatureService::from_fixture_file(&path)?)
        }
        Err(_) => Arc::new(ArcGisClient::new(config.request_timeout)?),
    };
    let state = AppState::new(FeatureQueryService::new(config, service));
    let app = router(state);

    let addr: SocketAddr = std::env::var("STORMQUERY_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("http listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
