//! Run outcomes reported to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ScrapeStats;

/// Why a run terminated early.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunFailure {
    #[error("Source not found: {0}")]
    SourceNotFound(i64),
    #[error("Source is disabled: {0}")]
    SourceDisabled(String),
    #[error("Scraper not available for '{source_type}': {reason}")]
    ScraperUnavailable { source_type: String, reason: String },
    #[error("Storage failure: {0}")]
    Persistence(String),
    #[error("Scraping failed: {0}")]
    Scrape(String),
}

/// Counts and errors from one engine run.
///
/// `leads_scraped` counts valid leads taken from the scraper, so it never
/// exceeds the run's `max_leads` cap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub leads_scraped: usize,
    pub leads_saved: usize,
    pub duplicates: usize,
    /// Leads dropped by validation.
    pub skipped: usize,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunResult {
    /// A result for a run that stopped before scraping anything.
    pub fn failed(failure: RunFailure) -> Self {
        let mut result = Self::default();
        result.fail(failure);
        result
    }

    /// Record a terminal failure, keeping any counts gathered so far.
    pub fn fail(&mut self, failure: RunFailure) {
        let message = failure.to_string();
        self.success = false;
        self.errors.push(message.clone());
        self.error = Some(message);
        self.failure = Some(failure);
    }
}

/// A run result tagged with the source it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub source_id: i64,
    pub source_name: String,
    #[serde(flatten)]
    pub result: RunResult,
}

/// Lead and run totals for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub leads: i64,
    pub runs: ScrapeStats,
}

/// Platform-wide totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_sources: usize,
    pub enabled_sources: usize,
    pub total_leads: i64,
    pub sources: Vec<SourceSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_keeps_partial_counts() {
        let mut result = RunResult {
            leads_scraped: 60,
            leads_saved: 50,
            ..Default::default()
        };
        result.fail(RunFailure::Scrape("connection reset".into()));

        assert!(!result.success);
        assert_eq!(result.leads_saved, 50);
        assert_eq!(result.error.as_deref(), Some("Scraping failed: connection reset"));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_failure_serializes_with_kind() {
        let result = RunResult::failed(RunFailure::SourceNotFound(42));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["failure"]["kind"], "source_not_found");
        assert_eq!(json["failure"]["detail"], 42);
    }
}
