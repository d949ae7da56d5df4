//! Run log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "started" => Some(Self::Started),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// One engine invocation for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeLog {
    pub id: i64,
    pub source_id: i64,
    /// Name of the source, when it still exists.
    pub source_name: Option<String>,
    pub status: RunStatus,
    /// Number of leads persisted by the run.
    pub leads_scraped: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeStats {
    pub total_runs: i64,
    pub successful: i64,
    pub failed: i64,
    pub total_leads: i64,
}
