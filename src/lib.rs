//! leadharvest - business lead harvesting engine.
//!
//! Scrapes business listings from configured directory sources, validates and
//! scores the extracted leads, and stores them in SQLite with per-run logs.
//! Harvests can be run on demand or on recurring schedules.

pub mod config;
pub mod engine;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod schema;
pub mod scoring;
pub mod scrapers;
pub mod seeds;
