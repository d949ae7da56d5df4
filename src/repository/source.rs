//! Source repository.

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::models::{NewSource, SourceChangeset, SourceRecord};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::util::{now_timestamp, parse_datetime};
use crate::models::{NewSourceConfig, PaginationType, SourceConfig, SourceUpdate};
use crate::schema::{leads, scheduled_jobs, scrape_logs, sources};

impl From<SourceRecord> for SourceConfig {
    fn from(record: SourceRecord) -> Self {
        SourceConfig {
            id: record.id,
            name: record.name,
            source_type: record.source_type,
            base_url: record.base_url,
            pagination_type: PaginationType::from_str(&record.pagination_type).unwrap_or_default(),
            selectors: serde_json::from_str(&record.selectors).unwrap_or_default(),
            rate_limit_delay: record.rate_limit_delay,
            proxy_config: record
                .proxy_config
                .and_then(|json| serde_json::from_str(&json).ok()),
            enabled: record.enabled,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Row ID of the last insert on this connection.
pub(crate) async fn last_insert_id(conn: &mut SqliteConn) -> Result<i64, DbError> {
    diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()"))
        .get_result::<i64>(conn)
        .await
}

/// Repository for configured lead sources.
#[derive(Clone)]
pub struct SourceRepository {
    pool: SqlitePool,
}

impl SourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a source by ID.
    pub async fn get(&self, id: i64) -> Result<Option<SourceConfig>, DbError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .find(id)
            .select(SourceRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(SourceConfig::from))
    }

    /// Get a source by its unique name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<SourceConfig>, DbError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .filter(sources::name.eq(name))
            .select(SourceRecord::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(SourceConfig::from))
    }

    /// Get all sources ordered by ID.
    pub async fn get_all(&self) -> Result<Vec<SourceConfig>, DbError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .order(sources::id.asc())
            .select(SourceRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(SourceConfig::from).collect())
    }

    /// Get enabled sources ordered by ID.
    pub async fn get_enabled(&self) -> Result<Vec<SourceConfig>, DbError> {
        let mut conn = self.pool.get().await?;

        sources::table
            .filter(sources::enabled.eq(true))
            .order(sources::id.asc())
            .select(SourceRecord::as_select())
            .load(&mut conn)
            .await
            .map(|records| records.into_iter().map(SourceConfig::from).collect())
    }

    /// Insert a source and return its new ID.
    ///
    /// Fails with a unique violation if the name is taken.
    pub async fn add(&self, source: &NewSourceConfig) -> Result<i64, DbError> {
        let selectors = serde_json::to_string(&source.selectors).unwrap_or_else(|_| "{}".into());
        let proxy_config = source
            .proxy_config
            .as_ref()
            .filter(|p| !p.is_empty())
            .and_then(|p| serde_json::to_string(p).ok());
        let now = now_timestamp();

        let mut conn = self.pool.writer().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::insert_into(sources::table)
                    .values(NewSource {
                        name: &source.name,
                        source_type: &source.source_type,
                        base_url: &source.base_url,
                        pagination_type: source.pagination_type.as_str(),
                        selectors: &selectors,
                        rate_limit_delay: source.rate_limit_delay,
                        proxy_config: proxy_config.as_deref(),
                        enabled: source.enabled,
                        created_at: &now,
                        updated_at: &now,
                    })
                    .execute(conn)
                    .await?;
                last_insert_id(conn).await
            })
        })
        .await
    }

    /// Apply a partial update. Returns false if the source does not exist.
    pub async fn update(&self, id: i64, update: &SourceUpdate) -> Result<bool, DbError> {
        let changes = SourceChangeset {
            name: update.name.clone(),
            source_type: update.source_type.clone(),
            base_url: update.base_url.clone(),
            pagination_type: update.pagination_type.map(|p| p.as_str().to_string()),
            selectors: update
                .selectors
                .as_ref()
                .and_then(|s| serde_json::to_string(s).ok()),
            rate_limit_delay: update.rate_limit_delay,
            proxy_config: update.proxy_config.as_ref().map(|proxy| {
                proxy
                    .as_ref()
                    .filter(|p| !p.is_empty())
                    .and_then(|p| serde_json::to_string(p).ok())
            }),
            enabled: update.enabled,
            updated_at: Some(now_timestamp()),
        };

        let mut conn = self.pool.writer().await?;
        let rows = diesel::update(sources::table.find(id))
            .set(&changes)
            .execute(&mut *conn)
            .await?;

        Ok(rows > 0)
    }

    /// Enable or disable a source.
    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool, DbError> {
        self.update(id, &SourceUpdate::enabled(enabled)).await
    }

    /// Delete a source together with its leads, run logs and scheduled jobs.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let mut conn = self.pool.writer().await?;
        conn.transaction(|conn| {
            Box::pin(async move {
                diesel::delete(leads::table.filter(leads::source_id.eq(id)))
                    .execute(conn)
                    .await?;
                diesel::delete(scrape_logs::table.filter(scrape_logs::source_id.eq(id)))
                    .execute(conn)
                    .await?;
                diesel::delete(scheduled_jobs::table.filter(scheduled_jobs::source_id.eq(id)))
                    .execute(conn)
                    .await?;
                let rows = diesel::delete(sources::table.find(id))
                    .execute(conn)
                    .await?;
                Ok::<_, DbError>(rows > 0)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyConfig;
    use crate::repository::DbContext;
    use tempfile::tempdir;

    async fn setup() -> (DbContext, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        (ctx, dir)
    }

    #[tokio::test]
    async fn test_source_crud() {
        let (ctx, _dir) = setup().await;
        let repo = ctx.sources();

        let new = NewSourceConfig::new("Test Directory", "direct_listing", "https://x.test")
            .with_selector("business_name", ".name")
            .with_pagination(PaginationType::ClickNext);
        let id = repo.add(&new).await.unwrap();

        let fetched = repo.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Test Directory");
        assert_eq!(fetched.pagination_type, PaginationType::ClickNext);
        assert_eq!(fetched.selector("business_name"), Some(".name"));
        assert!(fetched.enabled);

        assert_eq!(
            repo.find_by_name("Test Directory").await.unwrap().map(|s| s.id),
            Some(id)
        );
        assert_eq!(repo.get_all().await.unwrap().len(), 1);

        assert!(repo.delete(id).await.unwrap());
        assert!(repo.get(id).await.unwrap().is_none());
        assert!(!repo.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (ctx, _dir) = setup().await;
        let repo = ctx.sources();
        let new = NewSourceConfig::new("Same", "direct_listing", "https://x.test");

        repo.add(&new).await.unwrap();
        assert!(repo.add(&new).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_enabled_filter() {
        let (ctx, _dir) = setup().await;
        let repo = ctx.sources();
        let a = repo
            .add(&NewSourceConfig::new("A", "direct_listing", "https://a.test"))
            .await
            .unwrap();
        let b = repo
            .add(&NewSourceConfig::new("B", "direct_listing", "https://b.test").disabled())
            .await
            .unwrap();

        let enabled: Vec<i64> = repo.get_enabled().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(enabled, vec![a]);

        assert!(repo.set_enabled(b, true).await.unwrap());
        assert_eq!(repo.get_enabled().await.unwrap().len(), 2);

        let update = SourceUpdate {
            rate_limit_delay: Some(1.5),
            proxy_config: Some(Some(ProxyConfig {
                http: Some("http://127.0.0.1:8080".into()),
                https: None,
            })),
            ..Default::default()
        };
        assert!(repo.update(a, &update).await.unwrap());
        let fetched = repo.get(a).await.unwrap().unwrap();
        assert_eq!(fetched.rate_limit_delay, 1.5);
        assert!(fetched.proxy_config.is_some());

        let clear = SourceUpdate {
            proxy_config: Some(None),
            ..Default::default()
        };
        repo.update(a, &clear).await.unwrap();
        assert!(repo.get(a).await.unwrap().unwrap().proxy_config.is_none());

        assert!(!repo.set_enabled(9999, true).await.unwrap());
    }
}
