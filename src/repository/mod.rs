//! Repository layer for database persistence.
//!
//! All database access uses Diesel with the async SQLite wrapper.

pub mod context;
pub mod job;
pub mod lead;
pub mod models;
pub mod pool;
pub mod scrape_log;
pub mod source;
pub mod util;

pub use context::DbContext;
pub use job::JobRepository;
pub use lead::LeadRepository;
pub use pool::{DbError, SqlitePool};
pub use scrape_log::ScrapeLogRepository;
pub use source::SourceRepository;
pub use util::{parse_datetime, parse_datetime_opt};
