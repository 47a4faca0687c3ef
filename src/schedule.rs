//! Minute-slot logging schedule.
//!
//! A reading is due when the UTC minute is a multiple of the configured
//! interval and the clock is still within the first `tolerance` seconds of
//! that minute. Each slot fires at most once, however often the scheduler
//! wakes up inside the window.

use crate::config::ScheduleConfig;
use chrono::{DateTime, DurationRound, TimeDelta, Timelike, Utc};

/// Decides when a polling cycle is due.
#[derive(Debug, Clone)]
pub struct LogSchedule {
    interval_minutes: u32,
    tolerance_seconds: u32,
    last_slot: Option<DateTime<Utc>>,
}

impl LogSchedule {
    /// Schedule firing every `interval_minutes`, within `tolerance_seconds`.
    pub fn new(interval_minutes: u32, tolerance_seconds: u32) -> Self {
        Self {
            interval_minutes: interval_minutes.max(1),
            tolerance_seconds,
            last_slot: None,
        }
    }

    /// True if `now` lies in the window of a minute slot.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        now.second() < self.tolerance_seconds && now.minute() % self.interval_minutes == 0
    }

    /// True once per slot, for the first `now` that falls in its window.
    pub fn is_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.in_window(now) {
            return false;
        }
        let slot = now
            .duration_trunc(TimeDelta::minutes(1))
            .unwrap_or(now);
        if self.last_slot == Some(slot) {
            return false;
        }
        self.last_slot = Some(slot);
        true
    }
}

impl From<&ScheduleConfig> for LogSchedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self::new(config.interval_minutes, config.tolerance_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_window() {
        let schedule = LogSchedule::new(5, 10);
        assert!(schedule.in_window(t(12, 0, 0)));
        assert!(schedule.in_window(t(12, 5, 9)));
        assert!(!schedule.in_window(t(12, 5, 10)));
        assert!(!schedule.in_window(t(12, 6, 0)));
    }

    #[test]
    fn test_fires_once_per_slot() {
        let mut schedule = LogSchedule::new(1, 10);
        assert!(schedule.is_due(t(12, 0, 1)));
        assert!(!schedule.is_due(t(12, 0, 2)));
        assert!(!schedule.is_due(t(12, 0, 9)));
        assert!(schedule.is_due(t(12, 1, 0)));
    }

    #[test]
    fn test_from_config() {
        let config = ScheduleConfig {
            interval_minutes: 15,
            tolerance_seconds: 5,
            ..ScheduleConfig::default()
        };
        let mut schedule = LogSchedule::from(&config);
        assert!(!schedule.is_due(t(12, 14, 0)));
        assert!(schedule.is_due(t(12, 15, 4)));
    }
}
