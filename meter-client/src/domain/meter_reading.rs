use serde::Serialize;
use time::OffsetDateTime;

/// A reading as persisted in `meter_data`.
///
/// `id` and `timestamp` are assigned by the store at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MeterReading {
    pub id: i64,
    pub meter_id: String,
    pub kwh: f64,
    pub voltage: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// The caller-supplied part of a reading. The store assigns `id` and `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeterReading {
    pub meter_id: String,
    pub kwh: f64,
    pub voltage: Option<f64>,
}

/// Per-device aggregate over all stored history.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MeterSummary {
    pub meter_id: String,
    pub readings: i64,
    pub avg_kwh: f64,
    /// `None` when the device never reported a voltage.
    pub avg_voltage: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_reading: OffsetDateTime,
}

/// Round to the two fractional digits the `NUMERIC(10, 2)` columns keep.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn rounds_to_two_fractional_digits() {
        assert_eq!(round_to_cents(12.346), 12.35);
        assert_eq!(round_to_cents(0.125), 0.13);
        assert_eq!(round_to_cents(7.0), 7.0);
    }

    #[test]
    fn reading_serializes_null_voltage_and_rfc3339_timestamp() {
        let reading = MeterReading {
            id: 1,
            meter_id: "M1".to_string(),
            kwh: 12.34,
            voltage: None,
            timestamp: datetime!(2024-05-01 12:00:00 UTC),
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["meter_id"], "M1");
        assert_eq!(json["kwh"], 12.34);
        assert!(json["voltage"].is_null());
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
