use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fireguard_alerts::{
    api::{self, AppState},
    config::Config,
    db::{self, PgStore},
    ingest::IngestService,
    monitor::ThresholdMonitor,
    reading_cache::ReadingCache,
    status::OfflineDetector,
};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; variables may come from the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let store = Arc::new(PgStore::new(pool));
    let cache = ReadingCache::new();

    let monitor = ThresholdMonitor::new(
        store.clone(),
        store.clone(),
        store.clone(),
        config.monitor_settings(),
    );
    let ingest = IngestService::new(store.clone(), cache.clone(), Arc::new(monitor));

    // Marks silent devices offline in the devices table
    {
        let detector = OfflineDetector::new(
            store.clone(),
            config.offline_check_secs,
            config.offline_after_secs,
        );
        tokio::spawn(detector.run());
    }

    let state = AppState {
        ingest: Arc::new(ingest),
        configs: store.clone(),
        alerts: store,
        cache,
        offline_after: config.offline_after(),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
