//! The single write path shared by the feed and the HTTP API.

use std::sync::Arc;

use meter_client::domain::{MeterReading, NewMeterReading};

use crate::store::{MeterStore, StoreError};

pub mod validate;

pub use validate::{check_reading, decode_feed_payload, validate_reading, DecodeError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Api,
    Feed,
}

impl IngestSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestSource::Api => "api",
            IngestSource::Feed => "feed",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validates and inserts readings. Cheap to clone; safe to call concurrently.
///
/// The store's insert atomicity is the only coordination between callers.
#[derive(Clone)]
pub struct IngestionWriter {
    store: Arc<dyn MeterStore>,
}

impl IngestionWriter {
    pub fn new(store: Arc<dyn MeterStore>) -> Self {
        Self { store }
    }

    /// Insert exactly one reading and return it as persisted.
    pub async fn write(&self, reading: NewMeterReading, source: IngestSource) -> Result<MeterReading, IngestError> {
        if let Err(e) = check_reading(&reading) {
            metrics::counter!("meter_readings_rejected_total", "source" => source.as_str()).increment(1);
            return Err(e.into());
        }

        match self.store.insert(&reading).await {
            Ok(row) => {
                metrics::counter!("meter_readings_ingested_total", "source" => source.as_str()).increment(1);
                tracing::debug!(id = row.id, meter_id = %row.meter_id, source = source.as_str(), "reading stored");
                Ok(row)
            }
            Err(e) => {
                metrics::counter!("meter_readings_failed_total", "source" => source.as_str()).increment(1);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMeterStore;

    #[tokio::test]
    async fn invalid_reading_never_reaches_store() {
        let store = Arc::new(InMemoryMeterStore::new());
        store.ensure_schema().await.unwrap();
        let writer = IngestionWriter::new(store.clone());

        let res = writer
            .write(
                NewMeterReading {
                    meter_id: String::new(),
                    kwh: 1.0,
                    voltage: None,
                },
                IngestSource::Api,
            )
            .await;

        assert!(matches!(res, Err(IngestError::Validation(ValidationError::InvalidMeterId))));
        assert!(store.list_recent(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let store = Arc::new(InMemoryMeterStore::new());
        store.ensure_schema().await.unwrap();
        store.set_available(false);
        let writer = IngestionWriter::new(store);

        let res = writer
            .write(
                NewMeterReading {
                    meter_id: "M1".to_string(),
                    kwh: 1.0,
                    voltage: None,
                },
                IngestSource::Feed,
            )
            .await;

        assert!(matches!(res, Err(IngestError::Store(StoreError::Unavailable(_)))));
    }
}
