//! Harvest engine: runs one source's scraper end to end.
//!
//! A run looks up the source, opens a run log, builds the scraper from the
//! registry, then streams leads through validation and scoring into buffered
//! bulk saves. Problems below run granularity (a bad element, an invalid
//! lead, a duplicate) are counted; anything above ends the run and is
//! recorded in the log.

mod result;

pub use result::{PlatformStats, RunFailure, RunResult, SourceRunResult, SourceSummary};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::models::{NewLead, RawLead, RunStatus, SourceConfig};
use crate::repository::{DbContext, DbError};
use crate::scoring::{score_lead, ScoreInput};
use crate::scrapers::{LeadScraper, LeadStream, ScraperRegistry};

/// Leads buffered before each bulk save.
pub const DEFAULT_BUFFER_SIZE: usize = 50;

/// Sources harvested at once by [`HarvestEngine::run_all_sources`].
pub const DEFAULT_RUN_ALL_CONCURRENCY: usize = 2;

/// Orchestrates harvest runs against the database.
#[derive(Clone)]
pub struct HarvestEngine {
    db: DbContext,
    registry: ScraperRegistry,
    buffer_size: usize,
    concurrency: usize,
}

impl HarvestEngine {
    pub fn new(db: DbContext, registry: ScraperRegistry) -> Self {
        Self {
            db,
            registry,
            buffer_size: DEFAULT_BUFFER_SIZE,
            concurrency: DEFAULT_RUN_ALL_CONCURRENCY,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn db(&self) -> &DbContext {
        &self.db
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    /// Harvest one source.
    ///
    /// Never returns an error: failures are reported through
    /// [`RunResult::failure`] together with whatever was saved before them.
    pub async fn run(&self, source_id: i64, max_leads: Option<usize>) -> RunResult {
        let source = match self.db.sources().get(source_id).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                warn!("Harvest requested for unknown source {}", source_id);
                return RunResult::failed(RunFailure::SourceNotFound(source_id));
            }
            Err(e) => return RunResult::failed(RunFailure::Persistence(e.to_string())),
        };

        let log_id = match self.db.logs().start(source_id).await {
            Ok(id) => id,
            Err(e) => return RunResult::failed(RunFailure::Persistence(e.to_string())),
        };

        if !source.enabled {
            let mut result = RunResult::failed(RunFailure::SourceDisabled(source.name.clone()));
            self.finish_log(log_id, &mut result).await;
            return result;
        }

        let mut scraper = match self.registry.create(&source) {
            Ok(scraper) => scraper,
            Err(e) => {
                error!("Failed to create scraper for {}: {}", source.name, e);
                let mut result = RunResult::failed(RunFailure::ScraperUnavailable {
                    source_type: source.source_type.clone(),
                    reason: e.to_string(),
                });
                self.finish_log(log_id, &mut result).await;
                return result;
            }
        };

        info!("Starting harvest for source: {}", source.name);
        let mut result = RunResult::default();
        let outcome = self
            .harvest(&source, scraper.as_mut(), max_leads, &mut result)
            .await;
        scraper.cleanup().await;

        match outcome {
            Ok(()) => {
                result.success = true;
                info!(
                    "Harvest of {} completed: {} new leads saved, {} duplicates",
                    source.name, result.leads_saved, result.duplicates
                );
            }
            Err(failure) => {
                error!("Harvest of {} failed: {}", source.name, failure);
                result.fail(failure);
            }
        }

        self.finish_log(log_id, &mut result).await;
        result
    }

    async fn harvest(
        &self,
        source: &SourceConfig,
        scraper: &mut dyn LeadScraper,
        max_leads: Option<usize>,
        result: &mut RunResult,
    ) -> Result<(), RunFailure> {
        let mut stream = scraper
            .produce_leads()
            .await
            .map_err(|e| RunFailure::Scrape(e.to_string()))?;
        let outcome = self.consume(source, &mut stream, max_leads, result).await;
        stream.close();
        outcome
    }

    /// Drain the stream into the database.
    ///
    /// A scraper error discards the unflushed buffer; earlier flushes stay
    /// committed.
    async fn consume(
        &self,
        source: &SourceConfig,
        stream: &mut LeadStream,
        max_leads: Option<usize>,
        result: &mut RunResult,
    ) -> Result<(), RunFailure> {
        let mut buffer: Vec<NewLead> = Vec::with_capacity(self.buffer_size);
        let mut produced = 0usize;

        loop {
            if max_leads.is_some_and(|cap| produced >= cap) {
                debug!("{}: reached cap of {} leads", source.name, produced);
                break;
            }
            let raw = match stream.next().await {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Err(RunFailure::Scrape(e.to_string())),
                None => break,
            };
            produced += 1;

            let lead = match validate(raw) {
                Ok(lead) => lead,
                Err(reason) => {
                    debug!("{}: {}", source.name, reason);
                    result.skipped += 1;
                    result.errors.push(reason);
                    continue;
                }
            };
            buffer.push(lead);
            result.leads_scraped += 1;

            if buffer.len() >= self.buffer_size {
                self.flush(source.id, &mut buffer, result).await?;
                info!(
                    "{}: {} scraped, {} saved, {} duplicates",
                    source.name, result.leads_scraped, result.leads_saved, result.duplicates
                );
            }
        }

        self.flush(source.id, &mut buffer, result).await
    }

    async fn flush(
        &self,
        source_id: i64,
        buffer: &mut Vec<NewLead>,
        result: &mut RunResult,
    ) -> Result<(), RunFailure> {
        if buffer.is_empty() {
            return Ok(());
        }
        let saved = self
            .db
            .leads()
            .bulk_save(source_id, buffer)
            .await
            .map_err(|e| RunFailure::Persistence(e.to_string()))?;
        buffer.clear();
        result.leads_saved += saved.saved;
        result.duplicates += saved.duplicates;
        Ok(())
    }

    /// Write the run's terminal status. A storage error here fails the run.
    async fn finish_log(&self, log_id: i64, result: &mut RunResult) {
        let status = if result.success {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        let written = self
            .db
            .logs()
            .finish(
                log_id,
                status,
                result.leads_saved as i64,
                result.error.as_deref(),
            )
            .await;
        if let Err(e) = written {
            error!("Failed to update run log {}: {}", log_id, e);
            result.fail(RunFailure::Persistence(e.to_string()));
        }
    }

    /// Harvest every enabled source, a few at a time.
    ///
    /// Results come back in source order.
    pub async fn run_all_sources(
        &self,
        max_leads_per_source: Option<usize>,
    ) -> Result<Vec<SourceRunResult>, DbError> {
        let sources = self.db.sources().get_enabled().await?;
        info!("Harvesting {} enabled sources", sources.len());

        let results = stream::iter(sources)
            .map(|source| async move {
                info!("Processing source: {}", source.name);
                let result = self.run(source.id, max_leads_per_source).await;
                SourceRunResult {
                    source_id: source.id,
                    source_name: source.name,
                    result,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(results)
    }

    /// Source, lead and run totals.
    pub async fn get_stats(&self) -> Result<PlatformStats, DbError> {
        let sources = self.db.sources().get_all().await?;
        let leads = self.db.leads();
        let logs = self.db.logs();

        let mut stats = PlatformStats {
            total_sources: sources.len(),
            enabled_sources: sources.iter().filter(|s| s.enabled).count(),
            ..Default::default()
        };
        for source in sources {
            let count = leads.count(Some(source.id)).await?;
            let runs = logs.stats(Some(source.id)).await?;
            stats.total_leads += count;
            stats.sources.push(SourceSummary {
                id: source.id,
                name: source.name,
                enabled: source.enabled,
                leads: count,
                runs,
            });
        }
        Ok(stats)
    }
}

/// Require a business name and at least one contact channel, then score.
fn validate(raw: RawLead) -> Result<NewLead, String> {
    let Some(name) = raw.name().map(str::to_string) else {
        return Err("Invalid lead skipped: Unknown (missing business name)".to_string());
    };
    if !raw.has_contact() {
        return Err(format!("Invalid lead skipped: {} (no contact details)", name));
    }

    let score = score_lead(&ScoreInput::fresh(&raw), Utc::now());
    NewLead::from_raw(raw, score).ok_or_else(|| format!("Invalid lead skipped: {}", name))
}
