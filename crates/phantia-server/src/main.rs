use std::net::SocketAddr;
use std::sync::Arc;

use phantia_core::{Coordinator, KeySpace, KeyValueStore};
use phantia_infrastructure::RedisStore;
use phantia_server::{build_router, AppState};
use phantia_shared::{config::AppConfig, telemetry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry
    let _telemetry = telemetry::init_telemetry(&config.app)?;
    info!("Phantia starting (env={})", config.app.env);

    // Connect to the store
    let store = RedisStore::connect(&config.store)?;
    if let Err(e) = store.ping().await {
        error!("Store unreachable at {}:{}: {}", config.store.host, config.store.port, e);
        std::process::exit(1);
    }
    info!("Store connection established.");

    let keys = KeySpace::new(config.store.key_prefix.clone())?;
    let coordinator = Coordinator::new(Arc::new(store), keys, config.ttl, config.rate_limit);
    let app = build_router(AppState::new(coordinator));

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);
    info!("Health: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Phantia stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
