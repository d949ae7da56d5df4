//! Next-run computation for schedule policies.

use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveTime, Timelike, Utc, Weekday};
use cron::Schedule;

use crate::models::{ScheduleError, SchedulePolicy};

/// Decides when a job fires next.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Calendar times in local time.
    Calendar(Box<Schedule>),
    /// A fixed period from the previous fire.
    Interval(Duration),
}

impl Trigger {
    pub fn for_policy(policy: &SchedulePolicy) -> Result<Self, ScheduleError> {
        match *policy {
            SchedulePolicy::Daily { at } => calendar(&cron_expression(at, None)),
            SchedulePolicy::Weekly { day, at } => calendar(&cron_expression(at, Some(day))),
            SchedulePolicy::Interval { hours } => {
                Ok(Self::Interval(Duration::hours(i64::from(hours))))
            }
        }
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Calendar(schedule) => schedule
                .after(&after.with_timezone(&Local))
                .next()
                .map(|t| t.with_timezone(&Utc)),
            Self::Interval(period) => after.checked_add_signed(*period),
        }
    }
}

fn calendar(expression: &str) -> Result<Trigger, ScheduleError> {
    Schedule::from_str(expression)
        .map(|s| Trigger::Calendar(Box::new(s)))
        .map_err(|e| ScheduleError::InvalidExpression(format!("{}: {}", expression, e)))
}

/// Six-field cron expression (`sec min hour dom month dow`).
fn cron_expression(at: NaiveTime, day: Option<Weekday>) -> String {
    let day = day.map_or_else(|| "*".to_string(), |d| d.to_string());
    format!("0 {} {} * * {}", at.minute(), at.hour(), day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_daily_fires_at_local_time() {
        let trigger = Trigger::for_policy(&SchedulePolicy::daily("09:00").unwrap()).unwrap();

        let next = trigger.next_after(local(2024, 3, 5, 8, 0)).unwrap();
        assert_eq!(next, local(2024, 3, 5, 9, 0));

        let next = trigger.next_after(local(2024, 3, 5, 9, 0)).unwrap();
        assert_eq!(next, local(2024, 3, 6, 9, 0));
    }

    #[test]
    fn test_weekly_fires_on_day() {
        let trigger =
            Trigger::for_policy(&SchedulePolicy::weekly("friday", "18:30").unwrap()).unwrap();
        // 2024-03-05 is a Tuesday.
        let next = trigger
            .next_after(local(2024, 3, 5, 12, 0))
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(next.weekday(), Weekday::Fri);
        assert_eq!((next.hour(), next.minute()), (18, 30));
        assert_eq!(next.day(), 8);
    }

    #[test]
    fn test_interval_adds_period() {
        let trigger = Trigger::for_policy(&SchedulePolicy::every_hours(6).unwrap()).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            trigger.next_after(start),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap())
        );
    }
}
