//! Periodic one-way mirror of a product catalog into a remote ingestion service.

pub mod config;
pub mod cycle;
pub mod db;
pub mod ingest;
pub mod model;
pub mod notify;
pub mod reconcile;
pub mod source;
pub mod staging;
