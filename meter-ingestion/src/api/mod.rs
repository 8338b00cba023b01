//! HTTP surface: write, recent readings, per-meter summary and health.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use meter_client::domain::{MeterReading, MeterSummary};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    health::{HealthReport, HealthReporter},
    ingest::{validate_reading, IngestError, IngestSource, IngestionWriter},
    query::QueryService,
    store::StoreError,
};

#[derive(Clone)]
pub struct AppState {
    pub writer: IngestionWriter,
    pub queries: QueryService,
    pub health: HealthReporter,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// Client-visible failure. Store detail is logged, never returned.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Validation(v) => ApiError::BadRequest(v.to_string()),
            IngestError::Store(s) => ApiError::Store(s),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(StoreError::PoolExhausted) => {
                tracing::error!("store pool exhausted");
                (StatusCode::SERVICE_UNAVAILABLE, "Database busy".to_string())
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database operation failed".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/meter-data", post(create_reading).get(list_readings))
        .route("/api/meter-data/summary", get(summarize_readings))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn create_reading(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MeterReading>), ApiError> {
    metrics::counter!("http_ingest_requests_total").increment(1);

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("request body must be valid JSON: {e}")))?;
    let reading = validate_reading(&value).map_err(IngestError::from)?;
    let row = state.writer.write(reading, IngestSource::Api).await?;

    Ok((StatusCode::CREATED, Json(row)))
}

async fn list_readings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<MeterReading>>, ApiError> {
    Ok(Json(state.queries.list_recent(params.limit).await?))
}

async fn summarize_readings(State(state): State<AppState>) -> Result<Json<Vec<MeterSummary>>, ApiError> {
    Ok(Json(state.queries.summarize().await?))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.health().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn pool_exhausted_is_service_unavailable() {
        let (status, body) = render(ApiError::Store(StoreError::PoolExhausted)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"error": "Database busy"}));
    }

    #[tokio::test]
    async fn other_store_errors_hide_detail() {
        let (status, body) = render(ApiError::Store(StoreError::Database(sqlx::Error::RowNotFound))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Database operation failed"}));
    }

    #[tokio::test]
    async fn validation_errors_carry_their_message() {
        let err = ApiError::from(IngestError::Validation(crate::ingest::ValidationError::MissingKwh));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "kwh is required"}));
    }
}
