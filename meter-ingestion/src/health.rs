use std::sync::Arc;

use serde::Serialize;

use crate::{feed::FeedStatus, store::MeterStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub store_connected: bool,
    pub feed_connected: bool,
}

/// Reports store reachability and feed subscription state. Never mutates.
#[derive(Clone)]
pub struct HealthReporter {
    store: Arc<dyn MeterStore>,
    feed: FeedStatus,
}

impl HealthReporter {
    pub fn new(store: Arc<dyn MeterStore>, feed: FeedStatus) -> Self {
        Self { store, feed }
    }

    pub async fn health(&self) -> HealthReport {
        let store_connected = self.store.is_reachable().await;
        let feed_connected = self.feed.is_connected();

        let status = if store_connected && feed_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            store_connected,
            feed_connected,
        }
    }
}
