//! Lead repository.
//!
//! Leads are deduplicated on (business name, city, phone) by a unique index.
//! Inserts use `INSERT OR IGNORE`, so a duplicate is reported rather than
//! raised as an error.

use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{LeadRecord, NewLeadRecord};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::source::last_insert_id;
use super::util::{now_timestamp, parse_datetime};
use crate::models::{BulkSaveResult, Lead, LeadQuery, NewLead, SaveOutcome};
use crate::schema::leads;

impl From<LeadRecord> for Lead {
    fn from(record: LeadRecord) -> Self {
        Lead {
            id: record.id,
            source_id: record.source_id,
            business_name: record.business_name,
            city: record.city,
            state: record.state,
            phone: record.phone,
            email: record.email,
            website: record.website,
            address: record.address,
            category: record.category,
            metadata: serde_json::from_str(&record.metadata).unwrap_or_default(),
            score: record.score,
            scraped_at: parse_datetime(&record.scraped_at),
        }
    }
}

async fn insert_lead(
    conn: &mut SqliteConn,
    source_id: i64,
    lead: &NewLead,
    scraped_at: &str,
) -> Result<SaveOutcome, DbError> {
    let metadata = serde_json::to_string(&lead.metadata).unwrap_or_else(|_| "{}".into());

    let rows = diesel::insert_or_ignore_into(leads::table)
        .values(NewLeadRecord {
            source_id,
            business_name: &lead.business_name,
            city: lead.city.as_deref(),
            state: lead.state.as_deref(),
            phone: lead.phone.as_deref(),
            email: lead.email.as_deref(),
            website: lead.website.as_deref(),
            address: lead.address.as_deref(),
            category: lead.category.as_deref(),
            metadata: &metadata,
            score: lead.score,
            scraped_at,
        })
        .execute(conn)
        .await?;

    if rows == 0 {
        return Ok(SaveOutcome::Duplicate);
    }
    Ok(SaveOutcome::Saved(last_insert_id(conn).await?))
}

/// Repository for harvested leads.
#[derive(Clone)]
pub struct LeadRepository {
    pool: SqlitePool,
}

impl LeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save one lead.
    pub async fn save(&self, source_id: i64, lead: &NewLead) -> Result<SaveOutcome, DbError> {
        let now = now_timestamp();
        let mut conn = self.pool.writer().await?;
        insert_lead(&mut conn, source_id, lead, &now).await
    }

    /// Save a batch of leads in one transaction.
    ///
    /// Duplicates are counted, not fatal. Any other error rolls back the batch.
    pub async fn bulk_save(
        &self,
        source_id: i64,
        batch: &[NewLead],
    ) -> Result<BulkSaveResult, DbError> {
        if batch.is_empty() {
            return Ok(BulkSaveResult::default());
        }

        let now = now_timestamp();
        let mut conn = self.pool.writer().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                let mut result = BulkSaveResult::default();
                for lead in batch {
                    match insert_lead(conn, source_id, lead, &now).await? {
                        SaveOutcome::Saved(_) => result.saved += 1,
                        SaveOutcome::Duplicate => result.duplicates += 1,
                    }
                }
                Ok::<_, DbError>(result)
            })
        })
        .await
    }

    /// Get a lead by ID.
    pub async fn get(&self, id: i64) -> Result<Option<Lead>, DbError> {
        let mut conn = self.pool.get().await?;

        leads::table
            .find(id)
            .select(LeadRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Lead::from))
    }

    /// Query leads, highest score first, then most recent.
    pub async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, DbError> {
        let mut conn = self.pool.get().await?;

        let mut q = leads::table
            .select(LeadRecord::as_select())
            .into_boxed();
        if let Some(source_id) = query.source_id {
            q = q.filter(leads::source_id.eq(source_id));
        }
        if let Some(min_score) = query.min_score {
            q = q.filter(leads::score.ge(min_score));
        }

        q.order((
            leads::score.desc(),
            leads::scraped_at.desc(),
            leads::id.desc(),
        ))
        .limit(query.limit.max(0))
        .offset(query.offset.max(0))
        .load(&mut conn)
        .await
        .map(|records| records.into_iter().map(Lead::from).collect())
    }

    /// Count leads, optionally for one source.
    pub async fn count(&self, source_id: Option<i64>) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        match source_id {
            Some(id) => {
                leads::table
                    .filter(leads::source_id.eq(id))
                    .select(count_star())
                    .first(&mut conn)
                    .await
            }
            None => leads::table.select(count_star()).first(&mut conn).await,
        }
    }

    /// Count leads scoring at or above a threshold.
    pub async fn count_min_score(&self, min_score: i32) -> Result<i64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        leads::table
            .filter(leads::score.ge(min_score))
            .select(count_star())
            .first(&mut conn)
            .await
    }

    /// Average score across all leads, if any exist.
    pub async fn average_score(&self) -> Result<Option<f64>, DbError> {
        let mut conn = self.pool.get().await?;

        let scores: Vec<i32> = leads::table.select(leads::score).load(&mut conn).await?;
        if scores.is_empty() {
            return Ok(None);
        }
        let total: i64 = scores.iter().map(|s| i64::from(*s)).sum();
        Ok(Some(total as f64 / scores.len() as f64))
    }

    /// Overwrite a lead's score.
    pub async fn update_score(&self, id: i64, score: i32) -> Result<bool, DbError> {
        let mut conn = self.pool.writer().await?;
        let rows = diesel::update(leads::table.find(id))
            .set(leads::score.eq(score.clamp(0, 100)))
            .execute(&mut *conn)
            .await?;
        Ok(rows > 0)
    }
}
