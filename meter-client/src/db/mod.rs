pub mod meter_reading_queries;
pub mod schema;
