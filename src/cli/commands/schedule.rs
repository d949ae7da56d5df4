//! Schedule management commands.
//!
//! Jobs added here are stored in the database and picked up by `harvest daemon`.

use std::sync::Arc;

use console::style;

use leadharvest::config::Settings;
use leadharvest::scheduler::Scheduler;

use crate::cli::helpers::open_db;

/// Policy parameters as given on the command line.
pub enum Policy<'a> {
    Daily { at: &'a str },
    Interval { hours: u32 },
    Weekly { day: &'a str, at: &'a str },
}

async fn scheduler(settings: &Settings) -> anyhow::Result<Scheduler> {
    let ctx = open_db(settings).await?;
    let scheduler = Scheduler::new(Arc::new(settings.create_engine(ctx)));
    scheduler.restore().await?;
    Ok(scheduler)
}

pub async fn cmd_schedule_add(
    settings: &Settings,
    source_id: i64,
    policy: Policy<'_>,
    max_leads: Option<usize>,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let Some(source) = ctx.sources().get(source_id).await? else {
        println!("{} Source {} not found", style("✗").red(), source_id);
        return Ok(());
    };

    let scheduler = scheduler(settings).await?;
    let job_id = match policy {
        Policy::Daily { at } => scheduler.add_daily(source_id, at, max_leads).await?,
        Policy::Interval { hours } => {
            scheduler
                .add_interval(source_id, hours, max_leads)
                .await?
        }
        Policy::Weekly { day, at } => {
            scheduler
                .add_weekly(source_id, day, at, max_leads)
                .await?
        }
    };

    println!(
        "{} Scheduled {} for {}",
        style("✓").green(),
        style(&job_id).cyan(),
        source.name
    );
    if !source.enabled {
        println!(
            "  {} Source is disabled; runs will fail until it is enabled",
            style("!").yellow()
        );
    }
    Ok(())
}

pub async fn cmd_schedule_list(settings: &Settings) -> anyhow::Result<()> {
    let scheduler = scheduler(settings).await?;
    let jobs = scheduler.list_jobs().await;

    if jobs.is_empty() {
        println!("{} No scheduled jobs", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<28} {:>6} {:<22} {:>9} Next run",
        "Job", "Source", "Schedule", "Max leads"
    );
    println!("{}", "-".repeat(88));
    for info in jobs {
        let next = info
            .next_run
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|| "-".to_string());
        let max = info
            .job
            .max_leads
            .map_or_else(|| "-".to_string(), |m| m.to_string());
        println!(
            "{:<28} {:>6} {:<22} {:>9} {}",
            info.job.job_id, info.job.source_id, info.schedule, max, next
        );
    }
    Ok(())
}

pub async fn cmd_schedule_remove(settings: &Settings, job_id: &str) -> anyhow::Result<()> {
    let scheduler = scheduler(settings).await?;
    if scheduler.remove_job(job_id).await? {
        println!("{} Removed {}", style("✓").green(), job_id);
    } else {
        println!("{} No job named {}", style("!").yellow(), job_id);
    }
    Ok(())
}
