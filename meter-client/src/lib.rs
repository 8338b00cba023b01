//! Domain types and Postgres access for persisted meter readings.

pub mod db;
pub mod domain;
