//! Initialize command.

use console::style;

use leadharvest::config::Settings;
use leadharvest::seeds::{production_sources, seed_sources, SeedOutcome};

/// Initialize the data directory and database, then seed sources.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = settings.create_db_context();
    ctx.init_schema().await?;
    println!("{} Database initialized", style("✓").green());

    let mut sources = production_sources();
    sources.extend(settings.sources.iter().cloned());

    println!("\n{}", style("Loading sources").bold());
    let outcomes = seed_sources(&ctx.sources(), &sources).await;

    let (mut loaded, mut skipped) = (0, 0);
    for (name, outcome) in &outcomes {
        match outcome {
            SeedOutcome::Loaded(id) => {
                loaded += 1;
                println!("  {} Loaded: {} (#{})", style("✓").green(), name, id);
            }
            SeedOutcome::Skipped => {
                skipped += 1;
                println!("  {} Skipped (exists): {}", style("⊘").dim(), name);
            }
            SeedOutcome::Failed(e) => {
                println!("  {} Failed: {} - {}", style("✗").red(), name, e);
            }
        }
    }

    println!("\nSummary: {} loaded, {} skipped", loaded, skipped);
    println!(
        "{} Initialized leadharvest in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
