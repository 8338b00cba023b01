use sqlx::PgPool;

use crate::domain::{MeterReading, MeterSummary, NewMeterReading};

/// Trivial round-trip used as a liveness probe.
pub async fn ping(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Insert one reading and return the row as stored.
///
/// Values are bound as FLOAT8 and cast into the NUMERIC(10, 2) columns on
/// assignment; they come back as FLOAT8 so callers never see NUMERIC.
pub async fn insert_reading(pool: &PgPool, reading: &NewMeterReading) -> sqlx::Result<MeterReading> {
    sqlx::query_as::<_, MeterReading>(
        r#"
        INSERT INTO meter_data (meter_id, kwh, voltage)
        VALUES ($1, $2::FLOAT8, $3::FLOAT8)
        RETURNING
            id,
            meter_id,
            kwh::FLOAT8     AS kwh,
            voltage::FLOAT8 AS voltage,
            "timestamp"
        "#,
    )
    .bind(&reading.meter_id)
    .bind(reading.kwh)
    .bind(reading.voltage)
    .fetch_one(pool)
    .await
}

/// Most recent readings, newest first. `id` breaks timestamp ties.
pub async fn list_recent(pool: &PgPool, limit: i64) -> sqlx::Result<Vec<MeterReading>> {
    sqlx::query_as::<_, MeterReading>(
        r#"
        SELECT
            id,
            meter_id,
            kwh::FLOAT8     AS kwh,
            voltage::FLOAT8 AS voltage,
            "timestamp"
        FROM meter_data
        ORDER BY "timestamp" DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// One row per distinct meter. `AVG` skips NULL voltages.
pub async fn summarize(pool: &PgPool) -> sqlx::Result<Vec<MeterSummary>> {
    sqlx::query_as::<_, MeterSummary>(
        r#"
        SELECT
            meter_id,
            COUNT(*)                        AS readings,
            ROUND(AVG(kwh), 2)::FLOAT8      AS avg_kwh,
            ROUND(AVG(voltage), 2)::FLOAT8  AS avg_voltage,
            MAX("timestamp")                AS last_reading
        FROM meter_data
        GROUP BY meter_id
        ORDER BY meter_id
        "#,
    )
    .fetch_all(pool)
    .await
}
