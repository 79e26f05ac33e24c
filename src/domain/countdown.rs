use crate::domain::models::Cycle;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let seconds = (now - started_at).num_seconds();
    u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
}

pub fn remaining_seconds(target_minutes: u32, elapsed_seconds: u32) -> u32 {
    (target_minutes * 60).saturating_sub(elapsed_seconds)
}

pub fn format_countdown(total_seconds: u32) -> String {
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSnapshot {
    pub cycle_id: Option<String>,
    pub elapsed_seconds: u32,
    pub remaining_seconds: u32,
    pub display: String,
    pub running: bool,
}

impl CountdownSnapshot {
    pub fn idle() -> Self {
        Self {
            cycle_id: None,
            elapsed_seconds: 0,
            remaining_seconds: 0,
            display: format_countdown(0),
            running: false,
        }
    }

    pub fn for_cycle(cycle: &Cycle, elapsed_seconds: u32, running: bool) -> Self {
        let remaining = remaining_seconds(cycle.target_minutes, elapsed_seconds);
        Self {
            cycle_id: Some(cycle.id.clone()),
            elapsed_seconds,
            remaining_seconds: remaining,
            display: format_countdown(remaining),
            running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn elapsed_seconds_truncates_and_clamps() {
        let start = fixed_time("2026-02-16T09:00:00Z");
        assert_eq!(elapsed_seconds(start, fixed_time("2026-02-16T09:02:05.900Z")), 125);
        assert_eq!(elapsed_seconds(start, fixed_time("2026-02-16T08:59:00Z")), 0);
    }

    #[test]
    fn remaining_seconds_floors_at_zero() {
        assert_eq!(remaining_seconds(5, 120), 180);
        assert_eq!(remaining_seconds(5, 301), 0);
    }

    #[test]
    fn format_countdown_pads_minutes_and_seconds() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(65), "01:05");
        assert_eq!(format_countdown(3600), "60:00");
    }

    #[test]
    fn snapshot_for_cycle_reports_remaining_display() {
        let cycle = Cycle::new("cyc-1", "Write spec", 5, fixed_time("2026-02-16T09:00:00Z"));
        let snapshot = CountdownSnapshot::for_cycle(&cycle, 125, true);
        assert_eq!(snapshot.remaining_seconds, 175);
        assert_eq!(snapshot.display, "02:55");
        assert!(snapshot.running);
    }

    proptest! {
        #[test]
        fn elapsed_plus_remaining_covers_target(target in 5u32..=60u32, elapsed in 0u32..4000u32) {
            let remaining = remaining_seconds(target, elapsed);
            prop_assert!(remaining <= target * 60);
            if elapsed <= target * 60 {
                prop_assert_eq!(remaining + elapsed, target * 60);
            } else {
                prop_assert_eq!(remaining, 0);
            }
        }
    }
}
