//! Read-only views over stored readings.

use std::sync::Arc;

use meter_client::domain::{MeterReading, MeterSummary};

use crate::store::{MeterStore, StoreError};

pub const DEFAULT_RECENT_LIMIT: u32 = 100;
pub const MAX_RECENT_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn MeterStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn MeterStore>) -> Self {
        Self { store }
    }

    /// Newest readings first, at most [`MAX_RECENT_LIMIT`] of them.
    pub async fn list_recent(&self, limit: Option<u32>) -> Result<Vec<MeterReading>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
        self.store.list_recent(i64::from(limit)).await
    }

    /// One row per distinct meter over all history.
    pub async fn summarize(&self) -> Result<Vec<MeterSummary>, StoreError> {
        self.store.summarize().await
    }
}
