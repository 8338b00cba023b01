mod meter_reading;

pub use meter_reading::{round_to_cents, MeterReading, MeterSummary, NewMeterReading};
