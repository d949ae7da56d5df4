//! Lead, run log and statistics commands.

use chrono::Utc;
use console::style;

use leadharvest::config::Settings;
use leadharvest::models::{Lead, LeadQuery};
use leadharvest::scoring::{score_lead, LeadTier, ScoreInput};

use crate::cli::helpers::{open_db, styled_status, truncate};

const RESCORE_PAGE: i64 = 500;

/// List stored leads.
pub async fn cmd_leads(
    settings: &Settings,
    source_id: Option<i64>,
    min_score: Option<i32>,
    limit: i64,
    offset: i64,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let leads = ctx
        .leads()
        .query(&LeadQuery {
            source_id,
            min_score,
            limit,
            offset,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }

    if leads.is_empty() {
        println!("{} No leads found", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<6} {:<30} {:<16} {:<18} {:>5} {:<5}",
        "ID", "Business", "City", "Phone", "Score", "Tier"
    );
    println!("{}", "-".repeat(86));
    for lead in &leads {
        println!(
            "{:<6} {:<30} {:<16} {:<18} {:>5} {:<5}",
            lead.id,
            truncate(&lead.business_name, 29),
            truncate(lead.city.as_deref().unwrap_or("-"), 15),
            truncate(lead.phone.as_deref().unwrap_or("-"), 17),
            lead.score,
            LeadTier::from_score(lead.score)
        );
    }
    println!("\n{} leads shown", leads.len());
    Ok(())
}

/// Show recent runs.
pub async fn cmd_logs(settings: &Settings, source_id: Option<i64>, limit: i64) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let logs = ctx.logs().recent(limit, source_id).await?;

    if logs.is_empty() {
        println!("{} No runs recorded", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<6} {:<26} {:<8} {:>6} {:<17} Error",
        "Run", "Source", "Status", "Leads", "Started"
    );
    println!("{}", "-".repeat(90));
    for log in logs {
        println!(
            "{:<6} {:<26} {:<8} {:>6} {:<17} {}",
            log.id,
            truncate(log.source_name.as_deref().unwrap_or("(deleted)"), 25),
            styled_status(log.status),
            log.leads_scraped,
            log.started_at.format("%Y-%m-%d %H:%M"),
            log.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Show platform statistics.
pub async fn cmd_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let leads = ctx.leads();
    let engine = settings.create_engine(ctx);
    let stats = engine.get_stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style("Platform Statistics").bold());
    println!("{}", "-".repeat(60));
    println!(
        "  Sources:        {} ({} enabled)",
        stats.total_sources, stats.enabled_sources
    );
    println!("  Leads:          {}", stats.total_leads);
    if let Some(avg) = leads.average_score().await? {
        println!("  Average score:  {:.1}", avg);
    }
    println!("  Hot leads:      {}", leads.count_min_score(80).await?);

    let active: Vec<_> = stats
        .sources
        .iter()
        .filter(|s| s.leads > 0 || s.runs.total_runs > 0)
        .collect();
    if !active.is_empty() {
        println!(
            "\n{:<30} {:>8} {:>6} {:>6} {:>6}",
            "Source", "Leads", "Runs", "OK", "Failed"
        );
        println!("{}", "-".repeat(60));
        for source in active {
            println!(
                "{:<30} {:>8} {:>6} {:>6} {:>6}",
                truncate(&source.name, 29),
                source.leads,
                source.runs.total_runs,
                source.runs.successful,
                source.runs.failed
            );
        }
    }
    Ok(())
}

/// Recompute every lead's score, for example after freshness has lapsed.
pub async fn cmd_rescore(settings: &Settings, source_id: Option<i64>) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let repo = ctx.leads();

    // Collect first: updating scores reorders the score-ordered pages.
    let mut all: Vec<Lead> = Vec::new();
    loop {
        let page = repo
            .query(&LeadQuery {
                source_id,
                min_score: None,
                limit: RESCORE_PAGE,
                offset: all.len() as i64,
            })
            .await?;
        let done = (page.len() as i64) < RESCORE_PAGE;
        all.extend(page);
        if done {
            break;
        }
    }

    let now = Utc::now();
    let mut changed = 0;
    for lead in &all {
        let score = score_lead(&ScoreInput::from(lead), now);
        if score != lead.score && repo.update_score(lead.id, score).await? {
            changed += 1;
        }
    }

    println!(
        "{} Rescored {} leads ({} changed)",
        style("✓").green(),
        all.len(),
        changed
    );
    Ok(())
}
