use std::time::Duration;

use meter_client::{
    db::{meter_reading_queries, schema},
    domain::{MeterReading, MeterSummary, NewMeterReading},
};
use sqlx::{
    postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions},
    Connection,
};

use super::{connect_with_retry, ConnectionError, MeterStore, SchemaError, Sleeper, StoreError};
use crate::config::StoreConfig;

/// Upper bound on the health reachability probe.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Postgres-backed store over a bounded sqlx pool.
pub struct PgMeterStore {
    pool: PgPool,
    connect_options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgMeterStore {
    /// Build the pool without touching the network.
    pub fn connect_lazy(cfg: &StoreConfig) -> Result<Self, StoreError> {
        let options: PgConnectOptions = cfg.uri.parse::<PgConnectOptions>()?.options([(
            "statement_timeout",
            (cfg.statement_timeout_secs * 1000).to_string(),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect_lazy_with(options.clone());

        Ok(Self {
            pool,
            connect_options: options,
            connect_timeout: Duration::from_secs(cfg.acquire_timeout_secs),
        })
    }

    /// Build the pool and block until a probe round-trip succeeds or the
    /// configured retries are spent.
    pub async fn connect(cfg: &StoreConfig, sleeper: &dyn Sleeper) -> Result<Self, ConnectionError> {
        let store = Self::connect_lazy(cfg).map_err(|source| ConnectionError { attempts: 0, source })?;

        tracing::info!(
            max_connections = cfg.max_connections,
            max_attempts = cfg.connect_retries,
            "connecting to store"
        );
        connect_with_retry(cfg.retry_policy(), sleeper, || store.startup_probe()).await?;

        Ok(store)
    }

    /// Open and close one connection outside the pool. A pool acquire would
    /// report every failure as a timeout; this keeps the real cause.
    async fn startup_probe(&self) -> Result<(), StoreError> {
        let conn = tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&self.connect_options))
            .await
            .map_err(|_| {
                StoreError::Unavailable(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs_f64()
                ))
            })??;
        conn.close().await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl MeterStore for PgMeterStore {
    async fn ensure_schema(&self) -> Result<(), SchemaError> {
        schema::ensure_schema(&self.pool)
            .await
            .map_err(|e| SchemaError(e.into()))?;
        tracing::info!("meter_data schema ready");
        Ok(())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        meter_reading_queries::ping(&self.pool).await?;
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        matches!(
            tokio::time::timeout(HEALTH_PROBE_TIMEOUT, meter_reading_queries::ping(&self.pool)).await,
            Ok(Ok(()))
        )
    }

    async fn insert(&self, reading: &NewMeterReading) -> Result<MeterReading, StoreError> {
        Ok(meter_reading_queries::insert_reading(&self.pool, reading).await?)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<MeterReading>, StoreError> {
        Ok(meter_reading_queries::list_recent(&self.pool, limit).await?)
    }

    async fn summarize(&self) -> Result<Vec<MeterSummary>, StoreError> {
        Ok(meter_reading_queries::summarize(&self.pool).await?)
    }
}
