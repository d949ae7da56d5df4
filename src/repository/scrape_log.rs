//! Run log repository.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{NewScrapeLog, ScrapeLogRecord};
use super::pool::{DbError, SqlitePool};
use super::source::last_insert_id;
use super::util::{now_timestamp, parse_datetime, parse_datetime_opt};
use crate::models::{RunStatus, ScrapeLog, ScrapeStats};
use crate::schema::{scrape_logs, sources};

fn to_log(record: ScrapeLogRecord, source_name: Option<String>) -> ScrapeLog {
    ScrapeLog {
        id: record.id,
        source_id: record.source_id,
        source_name,
        status: RunStatus::from_str(&record.status).unwrap_or(RunStatus::Failed),
        leads_scraped: record.leads_scraped,
        error_message: record.error_message,
        started_at: parse_datetime(&record.started_at),
        completed_at: parse_datetime_opt(record.completed_at),
    }
}

/// Repository for harvest run logs.
#[derive(Clone)]
pub struct ScrapeLogRepository {
    pool: SqlitePool,
}

impl ScrapeLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the start of a run and return the log ID.
    pub async fn start(&self, source_id: i64) -> Result<i64, DbError> {
        let now = now_timestamp();
        let mut conn = self.pool.writer().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::insert_into(scrape_logs::table)
                    .values(NewScrapeLog {
                        source_id,
                        status: RunStatus::Started.as_str(),
                        leads_scraped: 0,
                        started_at: &now,
                    })
                    .execute(conn)
                    .await?;
                last_insert_id(conn).await
            })
        })
        .await
    }

    /// Update a run's status and lead count.
    ///
    /// Terminal statuses also stamp `completed_at`.
    pub async fn finish(
        &self,
        log_id: i64,
        status: RunStatus,
        leads_scraped: i64,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let completed_at = status.is_terminal().then(now_timestamp);
        let mut conn = self.pool.writer().await?;

        diesel::update(scrape_logs::table.find(log_id))
            .set((
                scrape_logs::status.eq(status.as_str()),
                scrape_logs::leads_scraped.eq(leads_scraped),
                scrape_logs::error_message.eq(error_message),
                scrape_logs::completed_at.eq(completed_at),
            ))
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Get a log by ID.
    pub async fn get(&self, log_id: i64) -> Result<Option<ScrapeLog>, DbError> {
        let mut conn = self.pool.get().await?;

        let record = scrape_logs::table
            .find(log_id)
            .select(ScrapeLogRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        let Some(record) = record else {
            return Ok(None);
        };
        let name = sources::table
            .find(record.source_id)
            .select(sources::name)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        Ok(Some(to_log(record, name)))
    }

    /// Most recent runs first, optionally for one source.
    pub async fn recent(
        &self,
        limit: i64,
        source_id: Option<i64>,
    ) -> Result<Vec<ScrapeLog>, DbError> {
        let mut conn = self.pool.get().await?;

        let mut q = scrape_logs::table
            .select(ScrapeLogRecord::as_select())
            .into_boxed();
        if let Some(id) = source_id {
            q = q.filter(scrape_logs::source_id.eq(id));
        }
        let records = q
            .order((scrape_logs::started_at.desc(), scrape_logs::id.desc()))
            .limit(limit.max(0))
            .load(&mut conn)
            .await?;

        let names: HashMap<i64, String> = sources::table
            .select((sources::id, sources::name))
            .load::<(i64, String)>(&mut conn)
            .await?
            .into_iter()
            .collect();

        Ok(records
            .into_iter()
            .map(|r| {
                let name = names.get(&r.source_id).cloned();
                to_log(r, name)
            })
            .collect())
    }

    /// Aggregate run statistics, optionally for one source.
    pub async fn stats(&self, source_id: Option<i64>) -> Result<ScrapeStats, DbError> {
        let mut conn = self.pool.get().await?;

        let mut q = scrape_logs::table
            .select((scrape_logs::status, scrape_logs::leads_scraped))
            .into_boxed();
        if let Some(id) = source_id {
            q = q.filter(scrape_logs::source_id.eq(id));
        }
        let rows: Vec<(String, i64)> = q.load(&mut conn).await?;

        let mut stats = ScrapeStats::default();
        for (status, leads) in rows {
            stats.total_runs += 1;
            stats.total_leads += leads;
            match RunStatus::from_str(&status) {
                Some(RunStatus::Success) => stats.successful += 1,
                Some(RunStatus::Failed) => stats.failed += 1,
                _ => {}
            }
        }
        Ok(stats)
    }
}
