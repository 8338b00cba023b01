//! Store connection management.
//!
//! [`MeterStore`] is the only way the rest of the service touches the
//! durable store. A single handle is built at startup and shared as
//! `Arc<dyn MeterStore>`.

use meter_client::domain::{MeterReading, MeterSummary, NewMeterReading};

pub mod memory;
pub mod postgres;
pub mod retry;

pub use memory::InMemoryMeterStore;
pub use postgres::PgMeterStore;
pub use retry::{connect_with_retry, RetryPolicy, Sleeper, TokioSleeper};

/// Per-call store failure. Never fatal to the process.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no pooled connection became available within the acquire timeout")]
    PoolExhausted,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool is closed".to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Startup connection failure after every attempt was spent.
#[derive(thiserror::Error, Debug)]
#[error("store unreachable after {attempts} attempt(s): {source}")]
pub struct ConnectionError {
    pub attempts: u32,
    #[source]
    pub source: StoreError,
}

#[derive(thiserror::Error, Debug)]
#[error("schema initialization failed: {0}")]
pub struct SchemaError(#[from] pub StoreError);

#[async_trait::async_trait]
pub trait MeterStore: Send + Sync {
    /// Create the `meter_data` shape if absent. Idempotent.
    async fn ensure_schema(&self) -> Result<(), SchemaError>;

    /// One trivial round-trip.
    async fn probe(&self) -> Result<(), StoreError>;

    /// Cheap reachability check for health reporting. Must return promptly.
    async fn is_reachable(&self) -> bool;

    async fn insert(&self, reading: &NewMeterReading) -> Result<MeterReading, StoreError>;

    async fn list_recent(&self, limit: i64) -> Result<Vec<MeterReading>, StoreError>;

    async fn summarize(&self) -> Result<Vec<MeterSummary>, StoreError>;
}
