//! Harvest commands.

use console::style;

use leadharvest::config::Settings;

use crate::cli::helpers::{open_db, print_run_result};

/// Harvest one source.
pub async fn cmd_run(
    settings: &Settings,
    source_id: i64,
    max_leads: Option<usize>,
) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let engine = settings.create_engine(ctx);

    let label = match engine.db().sources().get(source_id).await? {
        Some(source) => source.name,
        None => format!("Source {}", source_id),
    };
    println!("{} Harvesting {}...", style("→").cyan(), label);

    let result = engine.run(source_id, max_leads).await;
    print_run_result(&label, &result);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// Harvest every enabled source.
pub async fn cmd_run_all(settings: &Settings, max_leads: Option<usize>) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let engine = settings.create_engine(ctx);

    println!("{} Harvesting all enabled sources...", style("→").cyan());
    let results = engine.run_all_sources(max_leads).await?;
    if results.is_empty() {
        println!("{} No enabled sources", style("!").yellow());
        return Ok(());
    }

    for run in &results {
        print_run_result(&run.source_name, &run.result);
    }

    let saved: usize = results.iter().map(|r| r.result.leads_saved).sum();
    let failed = results.iter().filter(|r| !r.result.success).count();
    println!(
        "\n{} sources, {} new leads, {} failed",
        results.len(),
        saved,
        failed
    );
    Ok(())
}
