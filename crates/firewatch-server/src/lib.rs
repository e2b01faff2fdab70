//! Hotspot ingestion and wind-cone risk service.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod lines;
pub mod loops;
pub mod state;
pub mod weather;
