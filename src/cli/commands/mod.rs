//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod daemon;
mod init;
mod leads;
mod run;
mod schedule;
mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use leadharvest::config::{load_settings, LoadOptions};
use leadharvest::models::PaginationType;

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Business lead harvesting from configurable listing sources")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database and load the built-in sources
    Init,

    /// Manage listing sources
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Harvest leads from one source, or all enabled sources
    Run {
        /// Source ID to harvest
        source_id: Option<i64>,
        /// Harvest every enabled source
        #[arg(short, long, conflicts_with = "source_id")]
        all: bool,
        /// Stop after this many leads per source
        #[arg(short, long, value_parser = parse_max_leads)]
        max_leads: Option<usize>,
    },

    /// List stored leads, best first
    Leads {
        /// Only leads from this source
        #[arg(short, long)]
        source: Option<i64>,
        /// Minimum score
        #[arg(long)]
        min_score: Option<i32>,
        #[arg(short, long, default_value = "50")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent runs
    Logs {
        /// Only runs of this source
        #[arg(short, long)]
        source: Option<i64>,
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show platform statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute lead scores
    Rescore {
        /// Only leads from this source
        #[arg(short, long)]
        source: Option<i64>,
    },

    /// Manage scheduled harvests
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },

    /// Run the scheduler in the foreground until interrupted
    Daemon,
}

#[derive(Subcommand)]
enum SourceCommands {
    /// List configured sources
    List,
    /// Show one source in detail
    Show { id: i64 },
    /// Add a source
    Add {
        #[arg(long)]
        name: String,
        /// Scraper type (direct_listing, proxy_rotating)
        #[arg(long = "type", default_value = "direct_listing")]
        source_type: String,
        #[arg(long)]
        url: String,
        #[arg(long, value_parser = parse_pagination, default_value = "direct")]
        pagination: PaginationType,
        /// Base delay between requests, in seconds
        #[arg(long, default_value = "3.0")]
        delay: f64,
        /// Field selector as FIELD=CSS (repeatable)
        #[arg(short, long = "selector", value_parser = parse_selector)]
        selectors: Vec<(String, String)>,
        /// Add the source disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Enable a source
    Enable { id: i64 },
    /// Disable a source
    Disable { id: i64 },
    /// Delete a source with its leads, logs and jobs
    Delete {
        id: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Harvest a source every day at HH:MM
    Daily {
        source_id: i64,
        at: String,
        #[arg(short, long, value_parser = parse_max_leads)]
        max_leads: Option<usize>,
    },
    /// Harvest a source every N hours
    Interval {
        source_id: i64,
        hours: u32,
        #[arg(short, long, value_parser = parse_max_leads)]
        max_leads: Option<usize>,
    },
    /// Harvest a source weekly on a day at HH:MM
    Weekly {
        source_id: i64,
        day: String,
        at: String,
        #[arg(short, long, value_parser = parse_max_leads)]
        max_leads: Option<usize>,
    },
    /// List scheduled jobs
    List,
    /// Remove a scheduled job
    Remove { job_id: String },
}

fn parse_pagination(s: &str) -> Result<PaginationType, String> {
    PaginationType::from_str(s)
        .ok_or_else(|| format!("expected direct, click_next or infinite_scroll, got '{}'", s))
}

fn parse_max_leads(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1; omit it for no limit".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_selector(s: &str) -> Result<(String, String), String> {
    let (field, selector) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=SELECTOR, got '{}'", s))?;
    if field.trim().is_empty() || selector.trim().is_empty() {
        return Err(format!("expected FIELD=SELECTOR, got '{}'", s));
    }
    Ok((field.trim().to_string(), selector.trim().to_string()))
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let (settings, _config) = load_settings(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Source { command } => match command {
            SourceCommands::List => source::cmd_source_list(&settings).await,
            SourceCommands::Show { id } => source::cmd_source_show(&settings, id).await,
            SourceCommands::Add {
                name,
                source_type,
                url,
                pagination,
                delay,
                selectors,
                disabled,
            } => {
                let mut source =
                    leadharvest::models::NewSourceConfig::new(&name, &source_type, &url)
                        .with_pagination(pagination)
                        .with_delay(delay);
                source.selectors = selectors.into_iter().collect();
                source.enabled = !disabled;
                source::cmd_source_add(&settings, source).await
            }
            SourceCommands::Enable { id } => source::cmd_source_enable(&settings, id, true).await,
            SourceCommands::Disable { id } => {
                source::cmd_source_enable(&settings, id, false).await
            }
            SourceCommands::Delete { id, yes } => {
                source::cmd_source_delete(&settings, id, yes).await
            }
        },
        Commands::Run {
            source_id,
            all,
            max_leads,
        } => match (source_id, all) {
            (_, true) => run::cmd_run_all(&settings, max_leads).await,
            (Some(id), false) => run::cmd_run(&settings, id, max_leads).await,
            (None, false) => anyhow::bail!("Specify a source ID or --all"),
        },
        Commands::Leads {
            source,
            min_score,
            limit,
            offset,
            json,
        } => leads::cmd_leads(&settings, source, min_score, limit, offset, json).await,
        Commands::Logs { source, limit } => leads::cmd_logs(&settings, source, limit).await,
        Commands::Stats { json } => leads::cmd_stats(&settings, json).await,
        Commands::Rescore { source } => leads::cmd_rescore(&settings, source).await,
        Commands::Schedule { command } => match command {
            ScheduleCommands::Daily {
                source_id,
                at,
                max_leads,
            } => {
                schedule::cmd_schedule_add(
                    &settings,
                    source_id,
                    schedule::Policy::Daily { at: &at },
                    max_leads,
                )
                .await
            }
            ScheduleCommands::Interval {
                source_id,
                hours,
                max_leads,
            } => {
                schedule::cmd_schedule_add(
                    &settings,
                    source_id,
                    schedule::Policy::Interval { hours },
                    max_leads,
                )
                .await
            }
            ScheduleCommands::Weekly {
                source_id,
                day,
                at,
                max_leads,
            } => {
                schedule::cmd_schedule_add(
                    &settings,
                    source_id,
                    schedule::Policy::Weekly { day: &day, at: &at },
                    max_leads,
                )
                .await
            }
            ScheduleCommands::List => schedule::cmd_schedule_list(&settings).await,
            ScheduleCommands::Remove { job_id } => {
                schedule::cmd_schedule_remove(&settings, &job_id).await
            }
        },
        Commands::Daemon => daemon::cmd_daemon(&settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_source_add() {
        let cli = Cli::try_parse_from([
            "harvest",
            "source",
            "add",
            "--name",
            "Local",
            "--url",
            "https://local.test",
            "--pagination",
            "click_next",
            "-s",
            "business_name=h2 a",
            "-s",
            "next_page=a.next",
        ])
        .unwrap();

        let Commands::Source {
            command:
                SourceCommands::Add {
                    pagination,
                    selectors,
                    source_type,
                    ..
                },
        } = cli.command
        else {
            panic!("expected source add");
        };
        assert_eq!(pagination, PaginationType::ClickNext);
        assert_eq!(source_type, "direct_listing");
        assert_eq!(selectors[0], ("business_name".into(), "h2 a".into()));
    }

    #[test]
    fn test_bad_selector_rejected() {
        assert!(parse_selector("no-equals").is_err());
        assert!(parse_selector("=x").is_err());
    }

    #[test]
    fn test_zero_max_leads_rejected() {
        assert!(Cli::try_parse_from(["harvest", "run", "3", "--max-leads", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["harvest", "schedule", "interval", "3", "6", "-m", "0"]).is_err()
        );

        let cli = Cli::try_parse_from(["harvest", "run", "--all", "-m", "25"]).unwrap();
        match cli.command {
            Commands::Run { all, max_leads, .. } => {
                assert!(all);
                assert_eq!(max_leads, Some(25));
            }
            _ => panic!("expected run command"),
        }
    }
}
