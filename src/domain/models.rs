use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MIN_CYCLE_MINUTES: u32 = 5;
pub const MAX_CYCLE_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    InProgress,
    Interrupted,
    Finished,
}

impl CycleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Interrupted => "interrupted",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: String,
    pub task: String,
    pub target_minutes: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Cycle {
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        target_minutes: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            target_minutes,
            started_at,
            interrupted_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> CycleStatus {
        if self.finished_at.is_some() {
            CycleStatus::Finished
        } else if self.interrupted_at.is_some() {
            CycleStatus::Interrupted
        } else {
            CycleStatus::InProgress
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status() != CycleStatus::InProgress
    }

    pub fn target_seconds(&self) -> u32 {
        self.target_minutes * 60
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at.or(self.interrupted_at)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "cycle.id")?;
        validate_non_empty(&self.task, "cycle.task")?;
        validate_minutes(self.target_minutes, "cycle.targetMinutes")?;
        if self.interrupted_at.is_some() && self.finished_at.is_some() {
            return Err("cycle cannot be both interrupted and finished".to_string());
        }
        if let Some(ended_at) = self.ended_at() {
            if ended_at < self.started_at {
                return Err("cycle end must be >= cycle.startedAt".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewCycle {
    pub task: String,
    pub minutes_amount: u32,
}

impl NewCycle {
    pub fn new(task: impl Into<String>, minutes_amount: u32) -> Self {
        Self {
            task: task.into(),
            minutes_amount,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.task, "task")?;
        validate_minutes(self.minutes_amount, "minutesAmount")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    pub cycles: Vec<Cycle>,
    pub active_cycle_id: Option<String>,
}

impl CycleState {
    pub fn find(&self, cycle_id: &str) -> Option<&Cycle> {
        self.cycles.iter().find(|cycle| cycle.id == cycle_id)
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.active_cycle_id
            .as_deref()
            .and_then(|cycle_id| self.find(cycle_id))
            .filter(|cycle| !cycle.is_terminal())
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for cycle in &self.cycles {
            cycle.validate()?;
            if !seen.insert(cycle.id.as_str()) {
                return Err(format!("duplicate cycle id: {}", cycle.id));
            }
        }
        if let Some(active_cycle_id) = self.active_cycle_id.as_deref() {
            let Some(active) = self.find(active_cycle_id) else {
                return Err(format!("activeCycleId references unknown cycle: {active_cycle_id}"));
            };
            if active.is_terminal() {
                return Err(format!("activeCycleId references ended cycle: {active_cycle_id}"));
            }
        }
        Ok(())
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_minutes(value: u32, field_name: &str) -> Result<(), String> {
    if value < MIN_CYCLE_MINUTES {
        return Err(format!("{field_name} must be at least {MIN_CYCLE_MINUTES}"));
    }
    if value > MAX_CYCLE_MINUTES {
        return Err(format!("{field_name} must be at most {MAX_CYCLE_MINUTES}"));
    }
    Ok(())
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

    fn sample_cycle() -> Cycle {
        Cycle::new("cyc-1", "Write tests", 25, fixed_time("2026-02-16T09:00:00Z"))
    }

    #[test]
    fn cycle_validate_accepts_running_cycle() {
        let cycle = sample_cycle();
        assert!(cycle.validate().is_ok());
        assert_eq!(cycle.status(), CycleStatus::InProgress);
        assert_eq!(cycle.target_seconds(), 1500);
    }

    #[test]
    fn cycle_validate_rejects_both_terminal_dates() {
        let mut cycle = sample_cycle();
        cycle.interrupted_at = Some(fixed_time("2026-02-16T09:05:00Z"));
        cycle.finished_at = Some(fixed_time("2026-02-16T09:25:00Z"));
        assert!(cycle.validate().is_err());
    }

    #[test]
    fn cycle_validate_rejects_end_before_start() {
        let mut cycle = sample_cycle();
        cycle.finished_at = Some(fixed_time("2026-02-16T08:59:00Z"));
        assert!(cycle.validate().is_err());
    }

    #[test]
    fn new_cycle_validate_reports_field_messages() {
        assert_eq!(
            NewCycle::new("  ", 25).validate(),
            Err("task must not be empty".to_string())
        );
        assert_eq!(
            NewCycle::new("Read", 4).validate(),
            Err("minutesAmount must be at least 5".to_string())
        );
        assert_eq!(
            NewCycle::new("Read", 61).validate(),
            Err("minutesAmount must be at most 60".to_string())
        );
    }

    #[test]
    fn active_cycle_ignores_pointer_to_ended_cycle() {
        let mut cycle = sample_cycle();
        cycle.finished_at = Some(fixed_time("2026-02-16T09:25:00Z"));
        let state = CycleState {
            cycles: vec![cycle],
            active_cycle_id: Some("cyc-1".to_string()),
        };
        assert!(state.active_cycle().is_none());
        assert!(state.validate().is_err());
    }

    #[test]
    fn state_validate_rejects_duplicate_ids() {
        let state = CycleState {
            cycles: vec![sample_cycle(), sample_cycle()],
            active_cycle_id: None,
        };
        assert!(state.validate().is_err());
    }

    #[test]
    fn cycle_serializes_with_camel_case_rfc3339_fields() {
        let mut cycle = sample_cycle();
        cycle.interrupted_at = Some(fixed_time("2026-02-16T09:03:00Z"));
        let value = serde_json::to_value(&cycle).expect("serialize cycle");

        assert_eq!(value["targetMinutes"], 25);
        assert_eq!(value["startedAt"], "2026-02-16T09:00:00Z");
        assert_eq!(value["interruptedAt"], "2026-02-16T09:03:00Z");
        assert!(value.get("finishedAt").is_none());
    }

    proptest! {
        #[test]
        fn new_cycle_accepts_exactly_the_allowed_minute_range(minutes in 0u32..200u32) {
            let result = NewCycle::new("Focus", minutes).validate();
            let in_range = (MIN_CYCLE_MINUTES..=MAX_CYCLE_MINUTES).contains(&minutes);
            prop_assert_eq!(result.is_ok(), in_range);
        }
    }
}
