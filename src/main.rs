// src/main.rs
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use poll_service::clock::SystemClock;
use poll_service::config::Config;
use poll_service::db::{create_pool, PgStore};
use poll_service::memory::MemoryStore;
use poll_service::{routes, AppState, PollStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // Load environment variables from .env file

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn PollStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgStore::new(create_pool(url, &config).await?)),
        None => {
            warn!("DATABASE_URL not set, votes will only be kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = routes::create_routes(AppState::new(store, Arc::new(SystemClock), config));

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!(%addr, "server listening");
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
