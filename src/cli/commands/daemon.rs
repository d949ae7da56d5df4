//! Foreground scheduler command.

use std::sync::Arc;

use console::style;

use leadharvest::config::Settings;
use leadharvest::scheduler::Scheduler;

use crate::cli::helpers::open_db;

/// Restore stored jobs and run the scheduler until Ctrl+C.
pub async fn cmd_daemon(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let engine = Arc::new(settings.create_engine(ctx));
    let scheduler =
        Arc::new(Scheduler::new(engine).with_tick(settings.scheduler_tick));

    let restored = scheduler.restore().await?;
    println!(
        "{} Scheduler running with {} jobs",
        style("→").cyan(),
        restored
    );
    for info in scheduler.list_jobs().await {
        println!("  {} {}", style(&info.job.job_id).dim(), info.schedule);
    }
    println!("  Press Ctrl+C to stop");

    scheduler.start().await;
    tokio::signal::ctrl_c().await?;

    println!("\n{} Stopping scheduler...", style("→").cyan());
    scheduler.stop().await;
    Ok(())
}
