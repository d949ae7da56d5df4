//! Shared helper functions for CLI commands.

use console::style;

use leadharvest::config::Settings;
use leadharvest::engine::RunResult;
use leadharvest::models::RunStatus;
use leadharvest::repository::DbContext;

/// Open the database, failing with a hint if `init` has not been run.
pub async fn open_db(settings: &Settings) -> anyhow::Result<DbContext> {
    if !settings.database_exists() {
        anyhow::bail!(
            "No database at {}. Run 'harvest init' first.",
            settings.database_path().display()
        );
    }
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;
    Ok(ctx)
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

pub fn styled_status(status: RunStatus) -> String {
    match status {
        RunStatus::Success => style(status.as_str()).green().to_string(),
        RunStatus::Failed => style(status.as_str()).red().to_string(),
        RunStatus::Started => style(status.as_str()).yellow().to_string(),
    }
}

/// Print the outcome of one run.
pub fn print_run_result(label: &str, result: &RunResult) {
    if result.success {
        println!(
            "{} {}: {} scraped, {} saved, {} duplicates, {} skipped",
            style("✓").green(),
            label,
            result.leads_scraped,
            result.leads_saved,
            result.duplicates,
            result.skipped
        );
    } else {
        println!(
            "{} {}: {}",
            style("✗").red(),
            label,
            result.error.as_deref().unwrap_or("failed")
        );
        if result.leads_saved > 0 {
            println!("  Saved before failure: {}", result.leads_saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Better Business Bureau", 10), "Better Bu…");
    }
}
