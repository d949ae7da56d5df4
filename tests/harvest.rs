//! End-to-end harvest tests
//!
//! Drives the engine with the built-in direct listing scraper against a local
//! fixture site, then checks persistence, cascade deletes and scheduling.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use axum::routing::get;
use axum::Router;
use tempfile::{tempdir, TempDir};

use leadharvest::engine::HarvestEngine;
use leadharvest::models::{
    LeadQuery, NewSourceConfig, PaginationType, RunStatus, SchedulePolicy, ScheduledJob,
};
use leadharvest::repository::DbContext;
use leadharvest::scheduler::Scheduler;
use leadharvest::scrapers::{ScraperRegistry, ScraperSettings};

const PAGES: u32 = 3;
const PER_PAGE: u32 = 4;

fn listing_page(page: u32) -> String {
    let mut html = String::from("<html><body><div class=\"results\">");
    for i in 0..PER_PAGE {
        html.push_str(&format!(
            r#"<div class="listing">
                 <h2 class="name">Shop {page}-{i}</h2>
                 <span class="city">Austin</span>
                 <span class="phone">(512) 555-{page}{i:03}</span>
               </div>"#
        ));
    }
    // One listing per page has no contact details at all.
    html.push_str(r#"<div class="listing"><h2 class="name">Ghost Co</h2></div>"#);
    if page < PAGES {
        html.push_str(&format!(
            r#"<a class="next" href="/directory?page={}">Next</a>"#,
            page + 1
        ));
    }
    html.push_str("</div></body></html>");
    html
}

async fn serve_directory() -> String {
    let router = Router::new().route(
        "/directory",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
            if page > PAGES {
                return "<html><body></body></html>".to_string();
            }
            listing_page(page)
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/directory", addr)
}

struct Harness {
    _dir: TempDir,
    engine: HarvestEngine,
    source_id: i64,
}

async fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let db = DbContext::new(&dir.path().join("harvest.db"));
    db.init_schema().await.unwrap();

    let base = serve_directory().await;
    let source = NewSourceConfig::new("Fixture Directory", "direct_listing", &base)
        .with_pagination(PaginationType::ClickNext)
        .with_selector("business_name", ".name")
        .with_selector("city", ".city")
        .with_selector("phone", ".phone")
        .with_selector("next_page", "a.next")
        .with_delay(0.0);
    let source_id = db.sources().add(&source).await.unwrap();

    let registry = ScraperRegistry::with_defaults(ScraperSettings::without_pauses());
    Harness {
        _dir: dir,
        engine: HarvestEngine::new(db, registry).with_buffer_size(5),
        source_id,
    }
}

#[tokio::test]
async fn test_harvest_follows_pages_and_skips_contactless_listings() {
    let h = harness().await;

    let result = h.engine.run(h.source_id, None).await;
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.leads_scraped, (PAGES * PER_PAGE) as usize);
    assert_eq!(result.leads_saved, (PAGES * PER_PAGE) as usize);
    assert_eq!(result.skipped, PAGES as usize);
    assert!(result
        .errors
        .iter()
        .all(|e| e == "Invalid lead skipped: Ghost Co (no contact details)"));

    let leads = h
        .engine
        .db()
        .leads()
        .query(&LeadQuery {
            source_id: Some(h.source_id),
            ..LeadQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(leads.len(), (PAGES * PER_PAGE) as usize);
    assert!(leads.iter().all(|l| l.city.as_deref() == Some("Austin")));
    assert!(leads.iter().all(|l| (0..=100).contains(&l.score)));
}

#[tokio::test]
async fn test_second_harvest_only_finds_duplicates() {
    let h = harness().await;
    assert!(h.engine.run(h.source_id, None).await.success);

    let again = h.engine.run(h.source_id, None).await;
    assert!(again.success);
    assert_eq!(again.leads_saved, 0);
    assert_eq!(again.duplicates, (PAGES * PER_PAGE) as usize);

    let logs = h.engine.db().logs().recent(10, Some(h.source_id)).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == RunStatus::Success));
    // Most recent first.
    assert_eq!(logs[0].leads_scraped, 0);
    assert_eq!(logs[1].leads_scraped, (PAGES * PER_PAGE) as i64);
}

#[tokio::test]
async fn test_max_leads_bounds_every_run() {
    for cap in [0usize, 1, 3, 5, 9] {
        let h = harness().await;
        let result = h.engine.run(h.source_id, Some(cap)).await;
        assert!(result.success);
        assert!(result.leads_scraped <= cap, "cap {} gave {}", cap, result.leads_scraped);
        assert_eq!(
            h.engine.db().leads().count(Some(h.source_id)).await.unwrap(),
            result.leads_saved as i64
        );
    }
}

#[tokio::test]
async fn test_unreachable_site_yields_empty_successful_run() {
    let dir = tempdir().unwrap();
    let db = DbContext::new(&dir.path().join("harvest.db"));
    db.init_schema().await.unwrap();

    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = NewSourceConfig::new("Offline", "direct_listing", &format!("http://{}/", addr))
        .with_selector("business_name", ".name")
        .with_delay(0.0);
    let source_id = db.sources().add(&source).await.unwrap();

    let settings = ScraperSettings {
        max_attempts: 1,
        request_timeout_secs: 2,
        ..ScraperSettings::without_pauses()
    };
    let engine = HarvestEngine::new(db, ScraperRegistry::with_defaults(settings));
    let result = engine.run(source_id, None).await;
    assert!(result.success);
    assert_eq!(result.leads_saved, 0);
}

#[tokio::test]
async fn test_deleting_source_removes_leads_logs_and_jobs() {
    let h = harness().await;
    let db = h.engine.db().clone();
    assert!(h.engine.run(h.source_id, Some(3)).await.success);
    db.jobs()
        .save(&ScheduledJob::new(
            h.source_id,
            SchedulePolicy::daily("06:30").unwrap(),
            None,
        ))
        .await
        .unwrap();

    let keep = db
        .sources()
        .add(&NewSourceConfig::new("Other", "direct_listing", "https://other.test").disabled())
        .await
        .unwrap();
    db.jobs()
        .save(&ScheduledJob::new(keep, SchedulePolicy::every_hours(4).unwrap(), None))
        .await
        .unwrap();

    assert!(db.sources().delete(h.source_id).await.unwrap());
    assert!(db.sources().get(h.source_id).await.unwrap().is_none());
    assert_eq!(db.leads().count(Some(h.source_id)).await.unwrap(), 0);
    assert!(db.logs().recent(10, Some(h.source_id)).await.unwrap().is_empty());
    assert!(db.jobs().for_source(h.source_id).await.unwrap().is_empty());
    assert_eq!(db.jobs().for_source(keep).await.unwrap().len(), 1);

    // A run against the deleted id leaves no trace.
    let result = h.engine.run(h.source_id, None).await;
    assert!(!result.success);
    assert!(db.logs().recent(10, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scheduled_jobs_survive_restart() {
    let h = harness().await;
    let engine = Arc::new(h.engine.clone());

    let first = Scheduler::new(engine.clone());
    let daily = first.add_daily(h.source_id, "09:00", Some(10)).await.unwrap();
    let weekly = first
        .add_weekly(h.source_id, "friday", "17:30", None)
        .await
        .unwrap();
    assert_ne!(daily, weekly);
    // Same policy again replaces the stored job.
    assert_eq!(first.add_daily(h.source_id, "09:00", None).await.unwrap(), daily);
    drop(first);

    let second = Scheduler::new(engine);
    assert_eq!(second.restore().await.unwrap(), 2);
    let jobs = second.jobs_for_source(h.source_id).await;
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.next_run.is_some()));
    let daily_job = jobs.iter().find(|j| j.job.job_id == daily).unwrap();
    assert_eq!(daily_job.job.max_leads, None);

    assert!(second.remove_job(&weekly).await.unwrap());
    assert_eq!(h.engine.db().jobs().for_source(h.source_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_reflect_harvests() {
    let h = harness().await;
    h.engine.run(h.source_id, Some(4)).await;

    let stats = h.engine.get_stats().await.unwrap();
    assert_eq!(stats.total_sources, 1);
    assert_eq!(stats.enabled_sources, 1);
    assert_eq!(stats.total_leads, 4);
    let summary = &stats.sources[0];
    assert_eq!(summary.runs.total_runs, 1);
    assert_eq!(summary.runs.successful, 1);
    assert_eq!(summary.leads, 4);
}
