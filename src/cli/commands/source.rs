//! Source management commands.

use std::io::{self, Write};

use console::style;

use leadharvest::config::Settings;
use leadharvest::models::NewSourceConfig;

use crate::cli::helpers::{open_db, truncate};

/// List configured sources.
pub async fn cmd_source_list(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let sources = ctx.sources().get_all().await?;

    if sources.is_empty() {
        println!(
            "{} No sources configured. Run 'harvest init' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let leads = ctx.leads();
    println!("\n{}", style("Lead Sources").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<5} {:<30} {:<16} {:<9} {:>8}",
        "ID", "Name", "Type", "Enabled", "Leads"
    );
    println!("{}", "-".repeat(78));

    for source in sources {
        let count = leads.count(Some(source.id)).await?;
        let enabled = if source.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!(
            "{:<5} {:<30} {:<16} {:<9} {:>8}",
            source.id,
            truncate(&source.name, 29),
            truncate(&source.source_type, 15),
            enabled,
            count
        );
    }

    Ok(())
}

/// Show one source with its selectors and schedule.
pub async fn cmd_source_show(settings: &Settings, id: i64) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let Some(source) = ctx.sources().get(id).await? else {
        println!("{} Source {} not found", style("✗").red(), id);
        return Ok(());
    };

    println!("\n{} (#{})", style(&source.name).bold(), source.id);
    println!("  Type:        {}", source.source_type);
    println!("  URL:         {}", source.base_url);
    println!("  Pagination:  {}", source.pagination_type.as_str());
    println!("  Delay:       {:.1}s", source.rate_limit_delay);
    println!("  Enabled:     {}", source.enabled);
    if let Some(proxy) = &source.proxy_config {
        if let Some(http) = &proxy.http {
            println!("  HTTP proxy:  {}", http);
        }
        if let Some(https) = &proxy.https {
            println!("  HTTPS proxy: {}", https);
        }
    }

    if !source.selectors.is_empty() {
        println!("  Selectors:");
        for (field, selector) in &source.selectors {
            println!("    {:<18} {}", field, selector);
        }
    }

    let jobs = ctx.jobs().for_source(id).await?;
    for job in jobs {
        println!("  Schedule:    {} ({})", job.policy.describe(), job.job_id);
    }

    let stats = ctx.logs().stats(Some(id)).await?;
    println!(
        "  Runs:        {} total, {} ok, {} failed",
        stats.total_runs, stats.successful, stats.failed
    );
    println!("  Leads:       {}", ctx.leads().count(Some(id)).await?);

    Ok(())
}

/// Add a source.
pub async fn cmd_source_add(settings: &Settings, source: NewSourceConfig) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let repo = ctx.sources();

    if repo.find_by_name(&source.name).await?.is_some() {
        println!(
            "{} Source '{}' already exists",
            style("✗").red(),
            source.name
        );
        return Ok(());
    }

    let id = repo.add(&source).await?;
    println!(
        "{} Added source {} (#{})",
        style("✓").green(),
        source.name,
        id
    );
    Ok(())
}

/// Enable or disable a source.
pub async fn cmd_source_enable(settings: &Settings, id: i64, enabled: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    if ctx.sources().set_enabled(id, enabled).await? {
        let state = if enabled { "Enabled" } else { "Disabled" };
        println!("{} {} source {}", style("✓").green(), state, id);
    } else {
        println!("{} Source {} not found", style("✗").red(), id);
    }
    Ok(())
}

/// Delete a source and everything that belongs to it.
pub async fn cmd_source_delete(settings: &Settings, id: i64, confirm: bool) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let repo = ctx.sources();

    let Some(source) = repo.get(id).await? else {
        println!("{} Source {} not found", style("✗").red(), id);
        return Ok(());
    };

    let lead_count = ctx.leads().count(Some(id)).await?;
    println!(
        "\n{} Delete source '{}'",
        style("→").cyan(),
        style(&source.name).yellow()
    );
    println!("  Leads to delete: {}", lead_count);

    if !confirm {
        print!("\nProceed? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    repo.delete(id).await?;
    println!("{} Deleted '{}'", style("✓").green(), source.name);
    Ok(())
}
