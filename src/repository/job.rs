//! Scheduled job repository.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use super::models::ScheduledJobRecord;
use super::pool::{DbError, SqlitePool};
use super::util::parse_datetime;
use crate::models::{SchedulePolicy, ScheduledJob};
use crate::schema::scheduled_jobs;

impl ScheduledJobRecord {
    fn from_job(job: &ScheduledJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            source_id: job.source_id,
            schedule_type: job.policy.kind().to_string(),
            schedule_config: serde_json::to_string(&job.policy).unwrap_or_else(|_| "{}".into()),
            max_leads: job.max_leads.map(|n| n as i64),
            enabled: job.enabled,
            created_at: job.created_at.to_rfc3339(),
        }
    }

    fn into_job(self) -> Option<ScheduledJob> {
        let policy: SchedulePolicy = match serde_json::from_str(&self.schedule_config) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("Skipping job {} with unreadable schedule: {}", self.job_id, e);
                return None;
            }
        };
        Some(ScheduledJob {
            job_id: self.job_id,
            source_id: self.source_id,
            policy,
            max_leads: self.max_leads.and_then(|n| usize::try_from(n).ok()),
            enabled: self.enabled,
            created_at: parse_datetime(&self.created_at),
        })
    }
}

/// Repository for persisted schedule registrations.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a job by ID.
    pub async fn save(&self, job: &ScheduledJob) -> Result<(), DbError> {
        let record = ScheduledJobRecord::from_job(job);
        let mut conn = self.pool.writer().await?;

        diesel::replace_into(scheduled_jobs::table)
            .values(&record)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Delete a job. Returns false if it did not exist.
    pub async fn delete(&self, job_id: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.writer().await?;
        let rows = diesel::delete(scheduled_jobs::table.find(job_id))
            .execute(&mut *conn)
            .await?;
        Ok(rows > 0)
    }

    /// Delete every job for a source.
    pub async fn delete_for_source(&self, source_id: i64) -> Result<usize, DbError> {
        let mut conn = self.pool.writer().await?;
        diesel::delete(scheduled_jobs::table.filter(scheduled_jobs::source_id.eq(source_id)))
            .execute(&mut *conn)
            .await
    }

    /// All jobs ordered by ID. Rows that fail to parse are skipped.
    pub async fn get_all(&self) -> Result<Vec<ScheduledJob>, DbError> {
        let mut conn = self.pool.get().await?;

        scheduled_jobs::table
            .order(scheduled_jobs::job_id.asc())
            .select(ScheduledJobRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| {
                records
                    .into_iter()
                    .filter_map(ScheduledJobRecord::into_job)
                    .collect()
            })
    }

    /// Jobs for one source.
    pub async fn for_source(&self, source_id: i64) -> Result<Vec<ScheduledJob>, DbError> {
        let mut conn = self.pool.get().await?;

        scheduled_jobs::table
            .filter(scheduled_jobs::source_id.eq(source_id))
            .order(scheduled_jobs::job_id.asc())
            .select(ScheduledJobRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| {
                records
                    .into_iter()
                    .filter_map(ScheduledJobRecord::into_job)
                    .collect()
            })
    }
}
