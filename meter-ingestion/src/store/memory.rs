//! Process-local store with the same observable semantics as Postgres.
//!
//! Used by the test suite and by `store.backend = "memory"` for local runs.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use meter_client::domain::{round_to_cents, MeterReading, MeterSummary, NewMeterReading};
use time::OffsetDateTime;

use super::{MeterStore, SchemaError, StoreError};

#[derive(Default)]
struct Tables {
    meter_data: Option<Vec<MeterReading>>,
    next_id: i64,
}

pub struct InMemoryMeterStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
}

impl Default for InMemoryMeterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMeterStore {
    /// An empty store. Like a fresh database, `meter_data` does not exist
    /// until [`MeterStore::ensure_schema`] runs.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                meter_data: None,
                next_id: 1,
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn missing_table() -> StoreError {
    StoreError::Unavailable("relation \"meter_data\" does not exist".to_string())
}

#[derive(Default)]
struct SummaryAcc {
    readings: i64,
    kwh_sum: f64,
    voltage_sum: f64,
    voltage_count: i64,
    last_reading: Option<OffsetDateTime>,
}

#[async_trait::async_trait]
impl MeterStore for InMemoryMeterStore {
    async fn ensure_schema(&self) -> Result<(), SchemaError> {
        self.check_available()?;
        let mut tables = self.tables();
        if tables.meter_data.is_none() {
            tables.meter_data = Some(Vec::new());
        }
        Ok(())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn is_reachable(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn insert(&self, reading: &NewMeterReading) -> Result<MeterReading, StoreError> {
        self.check_available()?;
        let mut tables = self.tables();
        let id = tables.next_id;
        let rows = tables.meter_data.as_mut().ok_or_else(missing_table)?;

        // Server-assigned timestamps never go backwards within one store.
        let now = OffsetDateTime::now_utc();
        let timestamp = rows.last().map_or(now, |last| last.timestamp.max(now));

        let row = MeterReading {
            id,
            meter_id: reading.meter_id.clone(),
            kwh: round_to_cents(reading.kwh),
            voltage: reading.voltage.map(round_to_cents),
            timestamp,
        };
        rows.push(row.clone());
        tables.next_id += 1;
        Ok(row)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<MeterReading>, StoreError> {
        self.check_available()?;
        let tables = self.tables();
        let rows = tables.meter_data.as_ref().ok_or_else(missing_table)?;

        let mut recent = rows.clone();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        recent.truncate(limit.max(0) as usize);
        Ok(recent)
    }

    async fn summarize(&self) -> Result<Vec<MeterSummary>, StoreError> {
        self.check_available()?;
        let tables = self.tables();
        let rows = tables.meter_data.as_ref().ok_or_else(missing_table)?;

        let mut by_meter: BTreeMap<&str, SummaryAcc> = BTreeMap::new();
        for row in rows {
            let acc = by_meter.entry(row.meter_id.as_str()).or_default();
            acc.readings += 1;
            acc.kwh_sum += row.kwh;
            if let Some(v) = row.voltage {
                acc.voltage_sum += v;
                acc.voltage_count += 1;
            }
            acc.last_reading = Some(acc.last_reading.map_or(row.timestamp, |t| t.max(row.timestamp)));
        }

        Ok(by_meter
            .into_iter()
            .filter_map(|(meter_id, acc)| {
                Some(MeterSummary {
                    meter_id: meter_id.to_string(),
                    readings: acc.readings,
                    avg_kwh: round_to_cents(acc.kwh_sum / acc.readings as f64),
                    avg_voltage: (acc.voltage_count > 0)
                        .then(|| round_to_cents(acc.voltage_sum / acc.voltage_count as f64)),
                    last_reading: acc.last_reading?,
                })
            })
            .collect())
    }
}
