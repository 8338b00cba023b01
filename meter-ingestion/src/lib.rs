pub mod api;
pub mod app;
pub mod config;
pub mod feed;
pub mod health;
pub mod ingest;
pub mod metrics_server;
pub mod observability;
pub mod query;
pub mod store;

pub use api::{create_router, AppState};
pub use feed::{Envelope, FeedState, FeedStatus};
pub use ingest::{IngestSource, IngestionWriter};
