//! GenStudio HTTP server.

use std::sync::Arc;

use anyhow::Context;
use genstudio_core::api::{create_router, ApiState};
use genstudio_core::config::AppConfig;
use genstudio_core::db::init_db;
use genstudio_core::dispatcher::Dispatcher;
use genstudio_core::logging::{CompositeObserver, DispatchObserver, EventLogObserver, LogObserver};
use genstudio_core::media::MediaStore;
use genstudio_core::providers::catalog::PROVIDER_SEEDS;
use genstudio_core::providers::ProviderRegistry;
use genstudio_core::records::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use log::{info, warn};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting GenStudio server");
    let config = AppConfig::from_env();
    for seed in PROVIDER_SEEDS {
        if !config.provider(seed.id).is_configured() {
            warn!(
                "{} not set; {} will be skipped",
                seed.credential_env, seed.display
            );
        }
    }

    let observer = CompositeObserver::new().with(Arc::new(LogObserver));
    let (store, observer): (Arc<dyn RecordStore>, CompositeObserver) = match &config.database_path
    {
        Some(path) => {
            let pool = init_db(path)
                .with_context(|| format!("failed to initialise database at {}", path.display()))?;
            (
                Arc::new(SqliteRecordStore::new(pool.clone())),
                observer.with(Arc::new(EventLogObserver::new(pool))),
            )
        }
        None => {
            warn!("DATABASE_URL not set; generations are kept in memory only");
            (Arc::new(MemoryRecordStore::new()), observer)
        }
    };
    info!("Using {} record store", store.backend());

    let providers = ProviderRegistry::from_config(&config)?;
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        providers,
        MediaStore::new(&config.uploads_dir),
        Arc::new(observer) as Arc<dyn DispatchObserver>,
        config.provider_timeout,
    ));

    let state = ApiState::new(dispatcher, config.services());
    let app = create_router(state, &config.uploads_dir, config.static_dir.as_deref());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
