//! Data models for leadharvest.

mod job;
mod lead;
mod scrape_log;
mod source;

pub use job::{parse_time_of_day, ScheduleError, SchedulePolicy, ScheduledJob};
pub use lead::{
    BulkSaveResult, Lead, LeadMetadata, LeadQuery, NewLead, RawLead, SaveOutcome,
};
pub use scrape_log::{RunStatus, ScrapeLog, ScrapeStats};
pub use source::{
    NewSourceConfig, PaginationType, ProxyConfig, SelectorMap, SourceConfig, SourceUpdate,
};
