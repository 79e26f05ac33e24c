use crate::domain::models::{Cycle, CycleState};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAction {
    AddNewCycle { new_cycle: Cycle },
    InterruptCurrentCycle { interrupted_at: DateTime<Utc> },
    MarkCurrentCycleAsFinished { finished_at: DateTime<Utc> },
}

/// Applies one transition. Ending transitions are no-ops without a running
/// active cycle, and both clear the active pointer.
pub fn cycle_reducer(mut state: CycleState, action: CycleAction) -> CycleState {
    match action {
        CycleAction::AddNewCycle { new_cycle } => {
            state.active_cycle_id = Some(new_cycle.id.clone());
            state.cycles.push(new_cycle);
        }
        CycleAction::InterruptCurrentCycle { interrupted_at } => {
            if let Some(active) = active_cycle_mut(&mut state) {
                active.interrupted_at = Some(interrupted_at);
                state.active_cycle_id = None;
            }
        }
        CycleAction::MarkCurrentCycleAsFinished { finished_at } => {
            if let Some(active) = active_cycle_mut(&mut state) {
                active.finished_at = Some(finished_at);
                state.active_cycle_id = None;
            }
        }
    }
    state
}

fn active_cycle_mut(state: &mut CycleState) -> Option<&mut Cycle> {
    let active_cycle_id = state.active_cycle_id.as_deref()?;
    state
        .cycles
        .iter_mut()
        .find(|cycle| cycle.id == active_cycle_id)
        .filter(|cycle| !cycle.is_terminal())
}
