use sqlx::PgPool;

/// Character limit of `meter_data.meter_id` (`VARCHAR(255)`).
pub const METER_ID_MAX_CHARS: usize = 255;

/// Exclusive bound on the magnitude of `NUMERIC(10, 2)` values.
pub const NUMERIC_10_2_LIMIT: f64 = 1e8;

pub const METER_DATA_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS meter_data (
    id          BIGSERIAL PRIMARY KEY,
    meter_id    VARCHAR(255) NOT NULL,
    kwh         NUMERIC(10, 2) NOT NULL,
    voltage     NUMERIC(10, 2),
    "timestamp" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub const METER_DATA_TIMESTAMP_INDEX_DDL: &str = r#"
CREATE INDEX IF NOT EXISTS meter_data_timestamp_idx ON meter_data ("timestamp" DESC)
"#;

pub const METER_DATA_METER_ID_INDEX_DDL: &str = r#"
CREATE INDEX IF NOT EXISTS meter_data_meter_id_idx ON meter_data (meter_id)
"#;

/// Create `meter_data` and its indexes if they are missing.
///
/// Every statement is `IF NOT EXISTS`, so running this against an
/// initialized database changes nothing.
pub async fn ensure_schema(pool: &PgPool) -> sqlx::Result<()> {
    for ddl in [
        METER_DATA_TABLE_DDL,
        METER_DATA_TIMESTAMP_INDEX_DDL,
        METER_DATA_METER_ID_INDEX_DDL,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}
