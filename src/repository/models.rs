//! Diesel records for database tables.
//!
//! Timestamps are stored as RFC 3339 text; JSON columns as text.

use diesel::prelude::*;

use crate::schema;

/// Source record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::sources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub base_url: String,
    pub pagination_type: String,
    pub selectors: String,
    pub rate_limit_delay: f64,
    pub proxy_config: Option<String>,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// New source for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::sources)]
pub struct NewSource<'a> {
    pub name: &'a str,
    pub source_type: &'a str,
    pub base_url: &'a str,
    pub pagination_type: &'a str,
    pub selectors: &'a str,
    pub rate_limit_delay: f64,
    pub proxy_config: Option<&'a str>,
    pub enabled: bool,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial source update. `None` leaves the column untouched.
#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = schema::sources)]
pub struct SourceChangeset {
    pub name: Option<String>,
    pub source_type: Option<String>,
    pub base_url: Option<String>,
    pub pagination_type: Option<String>,
    pub selectors: Option<String>,
    pub rate_limit_delay: Option<f64>,
    pub proxy_config: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub updated_at: Option<String>,
}

/// Lead record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::leads)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LeadRecord {
    pub id: i64,
    pub source_id: i64,
    pub business_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub metadata: String,
    pub score: i32,
    pub scraped_at: String,
}

/// New lead for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::leads)]
pub struct NewLeadRecord<'a> {
    pub source_id: i64,
    pub business_name: &'a str,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub website: Option<&'a str>,
    pub address: Option<&'a str>,
    pub category: Option<&'a str>,
    pub metadata: &'a str,
    pub score: i32,
    pub scraped_at: &'a str,
}

/// Scrape log record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scrape_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScrapeLogRecord {
    pub id: i64,
    pub source_id: i64,
    pub status: String,
    pub leads_scraped: i64,
    pub error_message: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// New scrape log for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scrape_logs)]
pub struct NewScrapeLog<'a> {
    pub source_id: i64,
    pub status: &'a str,
    pub leads_scraped: i64,
    pub started_at: &'a str,
}

/// Scheduled job record, used for both reads and upserts.
#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = schema::scheduled_jobs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScheduledJobRecord {
    pub job_id: String,
    pub source_id: i64,
    pub schedule_type: String,
    pub schedule_config: String,
    pub max_leads: Option<i64>,
    pub enabled: bool,
    pub created_at: String,
}
