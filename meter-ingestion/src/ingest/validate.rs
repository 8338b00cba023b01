//! Validated decode of untyped JSON into a [`NewMeterReading`].
//!
//! Rules:
//! - the payload must be a JSON object.
//! - `meter_id` must be a non-empty string of at most 255 characters.
//! - `kwh` must be a number whose magnitude, rounded to cents, is below 1e8.
//! - `voltage` may be absent or null; otherwise it follows the `kwh` rule.
//!
//! Any `id` or `timestamp` in the input is ignored; both are assigned by the store.

use meter_client::{
    db::schema::{METER_ID_MAX_CHARS, NUMERIC_10_2_LIMIT},
    domain::{round_to_cents, NewMeterReading},
};
use serde_json::Value;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("meter_id is required")]
    MissingMeterId,
    #[error("meter_id must be a non-empty string")]
    InvalidMeterId,
    #[error("meter_id must be at most 255 characters")]
    MeterIdTooLong,
    #[error("kwh is required")]
    MissingKwh,
    #[error("kwh must be a finite number")]
    InvalidKwh,
    #[error("kwh must be less than 100000000 in magnitude")]
    KwhOutOfRange,
    #[error("voltage must be a finite number when present")]
    InvalidVoltage,
    #[error("voltage must be less than 100000000 in magnitude")]
    VoltageOutOfRange,
}

/// Feed-path failure: the message is logged and dropped.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid reading: {0}")]
    Invalid(#[from] ValidationError),
}

pub fn validate_reading(value: &Value) -> Result<NewMeterReading, ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let meter_id = match obj.get("meter_id") {
        None | Some(Value::Null) => return Err(ValidationError::MissingMeterId),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(ValidationError::InvalidMeterId),
    };

    let kwh = match obj.get("kwh") {
        None | Some(Value::Null) => return Err(ValidationError::MissingKwh),
        Some(v) => v.as_f64().ok_or(ValidationError::InvalidKwh)?,
    };

    let voltage = match obj.get("voltage") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_f64().ok_or(ValidationError::InvalidVoltage)?),
    };

    let reading = NewMeterReading { meter_id, kwh, voltage };
    check_reading(&reading)?;
    Ok(reading)
}

/// Checks that still apply to an already-typed reading.
pub fn check_reading(reading: &NewMeterReading) -> Result<(), ValidationError> {
    if reading.meter_id.trim().is_empty() {
        return Err(ValidationError::InvalidMeterId);
    }
    if reading.meter_id.chars().count() > METER_ID_MAX_CHARS {
        return Err(ValidationError::MeterIdTooLong);
    }
    if !reading.kwh.is_finite() {
        return Err(ValidationError::InvalidKwh);
    }
    if !fits_numeric_column(reading.kwh) {
        return Err(ValidationError::KwhOutOfRange);
    }
    if let Some(v) = reading.voltage {
        if !v.is_finite() {
            return Err(ValidationError::InvalidVoltage);
        }
        if !fits_numeric_column(v) {
            return Err(ValidationError::VoltageOutOfRange);
        }
    }
    Ok(())
}

/// The column rounds to cents on insert, so the bound applies after rounding.
fn fits_numeric_column(value: f64) -> bool {
    round_to_cents(value).abs() < NUMERIC_10_2_LIMIT
}

pub fn decode_feed_payload(payload: &[u8]) -> Result<NewMeterReading, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    Ok(validate_reading(&value)?)
}
