//! Startup wiring: store, schema, feed, HTTP.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use crate::{
    api::{create_router, AppState},
    config::{AppConfig, StoreBackend, StoreConfig},
    feed::{run_dispatcher, FeedStatus, MqttSubscriber},
    health::HealthReporter,
    ingest::IngestionWriter,
    query::QueryService,
    store::{ConnectionError, InMemoryMeterStore, MeterStore, PgMeterStore, TokioSleeper},
};

/// Build the store handle, blocking until it answers a probe.
pub async fn connect_store(cfg: &StoreConfig) -> Result<Arc<dyn MeterStore>, ConnectionError> {
    match cfg.backend {
        StoreBackend::Postgres => Ok(Arc::new(PgMeterStore::connect(cfg, &TokioSleeper).await?)),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; readings are lost on exit");
            Ok(Arc::new(InMemoryMeterStore::new()))
        }
    }
}

/// Run the service until a shutdown signal arrives.
///
/// Returns an error, and therefore a non-zero exit, if the store never
/// becomes reachable or the schema cannot be created.
pub async fn run(cfg: AppConfig) -> Result<()> {
    let store = connect_store(&cfg.store).await?;
    store.ensure_schema().await?;

    let feed_status = FeedStatus::new();
    let writer = IngestionWriter::new(store.clone());

    let feed_task = if cfg.broker.enabled {
        let (event_loop, messages) = MqttSubscriber::start(&cfg.broker, feed_status.clone())?.into_parts();
        tokio::spawn(run_dispatcher(messages, writer.clone()));
        Some(event_loop)
    } else {
        tracing::warn!("broker feed disabled; only the HTTP write path is active");
        None
    };

    let state = AppState {
        writer,
        queries: QueryService::new(store.clone()),
        health: HealthReporter::new(store, feed_status),
    };

    let listener = TcpListener::bind(&cfg.http.bind_addr).await?;
    tracing::info!(addr = %cfg.http.bind_addr, "HTTP API listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = feed_task {
        task.abort();
    }
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
