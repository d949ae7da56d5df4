//! Scheduled job models.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing schedule parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),
    #[error("Interval must be at least one hour")]
    ZeroInterval,
    #[error("Invalid calendar expression: {0}")]
    InvalidExpression(String),
}

/// When a job should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulePolicy {
    /// Every day at a local time.
    Daily { at: NaiveTime },
    /// Every N hours from when the job was registered.
    Interval { hours: u32 },
    /// Once a week on a day at a local time.
    Weekly { day: Weekday, at: NaiveTime },
}

impl SchedulePolicy {
    pub fn daily(at: &str) -> Result<Self, ScheduleError> {
        Ok(Self::Daily {
            at: parse_time_of_day(at)?,
        })
    }

    pub fn every_hours(hours: u32) -> Result<Self, ScheduleError> {
        if hours == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        Ok(Self::Interval { hours })
    }

    pub fn weekly(day: &str, at: &str) -> Result<Self, ScheduleError> {
        let day = day
            .trim()
            .parse::<Weekday>()
            .map_err(|_| ScheduleError::InvalidWeekday(day.to_string()))?;
        Ok(Self::Weekly {
            day,
            at: parse_time_of_day(at)?,
        })
    }

    /// Policy kind as stored in the `schedule_type` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Daily { .. } => "daily",
            Self::Interval { .. } => "interval",
            Self::Weekly { .. } => "weekly",
        }
    }

    /// Deterministic job identifier for this policy and source.
    pub fn job_id(&self, source_id: i64) -> String {
        match self {
            Self::Daily { at } => format!("daily_{}_{}", source_id, at.format("%H%M")),
            Self::Interval { hours } => format!("interval_{}_{}h", source_id, hours),
            Self::Weekly { day, at } => format!(
                "weekly_{}_{}_{}",
                source_id,
                weekday_name(*day),
                at.format("%H%M")
            ),
        }
    }

    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::Daily { at } => format!("Daily at {}", at.format("%H:%M")),
            Self::Interval { hours } => format!("Every {} hours", hours),
            Self::Weekly { day, at } => {
                let name = weekday_name(*day);
                let mut chars = name.chars();
                let capitalized = chars
                    .next()
                    .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
                    .unwrap_or_default();
                format!("{} at {}", capitalized, at.format("%H:%M"))
            }
        }
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) into a time of day.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, ScheduleError> {
    let trimmed = s.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(s.to_string()))
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// A registered scheduled harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    pub source_id: i64,
    pub policy: SchedulePolicy,
    pub max_leads: Option<usize>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn new(source_id: i64, policy: SchedulePolicy, max_leads: Option<usize>) -> Self {
        Self {
            job_id: policy.job_id(source_id),
            source_id,
            policy,
            max_leads,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_deterministic() {
        let daily = SchedulePolicy::daily("09:00").unwrap();
        assert_eq!(daily.job_id(7), "daily_7_0900");
        assert_eq!(daily.job_id(7), SchedulePolicy::daily("9:00").unwrap().job_id(7));

        let interval = SchedulePolicy::every_hours(6).unwrap();
        assert_eq!(interval.job_id(3), "interval_3_6h");

        let weekly = SchedulePolicy::weekly("Monday", "14:30").unwrap();
        assert_eq!(weekly.job_id(2), "weekly_2_monday_1430");
        assert_eq!(weekly.describe(), "Monday at 14:30");
    }

    #[test]
    fn test_invalid_parameters() {
        assert_eq!(
            SchedulePolicy::daily("25:00"),
            Err(ScheduleError::InvalidTime("25:00".to_string()))
        );
        assert_eq!(
            SchedulePolicy::every_hours(0),
            Err(ScheduleError::ZeroInterval)
        );
        assert!(matches!(
            SchedulePolicy::weekly("someday", "10:00"),
            Err(ScheduleError::InvalidWeekday(_))
        ));
    }

    #[test]
    fn test_policy_serializes_with_kind_tag() {
        let policy = SchedulePolicy::daily("06:15").unwrap();
        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["kind"], "daily");
        let back: SchedulePolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }
}
