mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use notecheck_hybrid::{HybridChecker, NotecheckConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    init_tracing();
    let config = NotecheckConfig::load(None)?;
    let checker = HybridChecker::from_config(&config)?;
    let state = Arc::new(AppState { checker });
    let app = router(state);
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
