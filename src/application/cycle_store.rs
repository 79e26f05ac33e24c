use crate::domain::countdown::elapsed_seconds;
use crate::domain::models::{Cycle, CycleState, NewCycle};
use crate::domain::reducer::{cycle_reducer, CycleAction};
use crate::infrastructure::snapshot_store::{load_cycle_state, save_cycle_state, SnapshotStore};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static NEXT_CYCLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_cycle_id(now: DateTime<Utc>) -> String {
    let sequence = NEXT_CYCLE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("cyc-{}-{sequence}", now.timestamp_micros())
}

pub struct CycleStore {
    state: CycleState,
    amount_seconds_passed: u32,
    snapshot_store: Arc<dyn SnapshotStore>,
    storage_key: String,
    now_provider: NowProvider,
}

impl CycleStore {
    pub fn new(snapshot_store: Arc<dyn SnapshotStore>, storage_key: impl Into<String>) -> Self {
        Self {
            state: CycleState::default(),
            amount_seconds_passed: 0,
            snapshot_store,
            storage_key: storage_key.into(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    /// Replaces the in-memory state with the persisted snapshot, if any.
    /// Unreadable snapshots are ignored and the store stays empty. Elapsed
    /// seconds are seeded from the active cycle's start, capped at its target.
    /// Returns whether a snapshot was applied.
    pub fn restore(&mut self) -> bool {
        let restored = match load_cycle_state(self.snapshot_store.as_ref(), &self.storage_key) {
            Ok(Some(state)) => state,
            Ok(None) => return false,
            Err(error) => {
                tracing::warn!(
                    key = %self.storage_key,
                    error = %error,
                    "ignoring unreadable cycle snapshot"
                );
                return false;
            }
        };

        self.state = restored;
        let now = self.now();
        self.amount_seconds_passed = self
            .state
            .active_cycle()
            .map(|cycle| elapsed_seconds(cycle.started_at, now).min(cycle.target_seconds()))
            .unwrap_or(0);
        tracing::info!(
            cycles = self.state.cycles.len(),
            active_cycle_id = ?self.state.active_cycle_id,
            seconds_passed = self.amount_seconds_passed,
            "restored cycle snapshot"
        );
        true
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.state.cycles
    }

    pub fn active_cycle_id(&self) -> Option<&str> {
        self.state.active_cycle_id.as_deref()
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.state.active_cycle()
    }

    pub fn amount_seconds_passed(&self) -> u32 {
        self.amount_seconds_passed
    }

    pub fn set_seconds_passed(&mut self, seconds: u32) {
        self.amount_seconds_passed = seconds;
    }

    pub fn create(&mut self, new_cycle: NewCycle) -> Cycle {
        let now = self.now();
        let cycle = Cycle::new(
            next_cycle_id(now),
            new_cycle.task,
            new_cycle.minutes_amount,
            now,
        );
        self.dispatch(CycleAction::AddNewCycle {
            new_cycle: cycle.clone(),
        });
        self.amount_seconds_passed = 0;
        cycle
    }

    pub fn mark_active_as_finished(&mut self) -> Option<Cycle> {
        let active_cycle_id = self.active_cycle()?.id.clone();
        let finished_at = self.now();
        self.dispatch(CycleAction::MarkCurrentCycleAsFinished { finished_at });
        self.state.find(&active_cycle_id).cloned()
    }

    pub fn interrupt_active(&mut self) -> Option<Cycle> {
        let active_cycle_id = self.active_cycle()?.id.clone();
        let interrupted_at = self.now();
        self.dispatch(CycleAction::InterruptCurrentCycle { interrupted_at });
        self.state.find(&active_cycle_id).cloned()
    }

    fn dispatch(&mut self, action: CycleAction) {
        let previous = std::mem::take(&mut self.state);
        let next = cycle_reducer(previous.clone(), action);
        let changed = next != previous;
        self.state = next;
        if changed {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(error) = save_cycle_state(self.snapshot_store.as_ref(), &self.storage_key, &self.state) {
            tracing::warn!(key = %self.storage_key, error = %error, "failed to persist cycle snapshot");
        }
    }
}
