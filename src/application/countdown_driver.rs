use crate::application::cycle_store::CycleStore;
use crate::domain::countdown::{elapsed_seconds, CountdownSnapshot};
use crate::infrastructure::error::InfraError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running(CountdownSnapshot),
    Finished(CountdownSnapshot),
    Stopped,
}

/// Samples the clock once for `cycle_id`. Reaching the target finishes the
/// cycle and pins the elapsed seconds to the target.
pub fn tick(store: &mut CycleStore, cycle_id: &str) -> TickOutcome {
    let Some(active) = store
        .active_cycle()
        .filter(|cycle| cycle.id == cycle_id)
        .cloned()
    else {
        return TickOutcome::Stopped;
    };

    let target = active.target_seconds();
    let elapsed = elapsed_seconds(active.started_at, store.now());
    if elapsed >= target {
        store.set_seconds_passed(target);
        store.mark_active_as_finished();
        tracing::info!(cycle_id = %active.id, task = %active.task, "cycle finished");
        return TickOutcome::Finished(CountdownSnapshot::for_cycle(&active, target, false));
    }

    store.set_seconds_passed(elapsed);
    TickOutcome::Running(CountdownSnapshot::for_cycle(&active, elapsed, true))
}

pub struct CountdownDriver {
    store: Arc<Mutex<CycleStore>>,
    tick_interval: Duration,
    snapshots: Arc<watch::Sender<CountdownSnapshot>>,
}

impl CountdownDriver {
    pub fn new(store: Arc<Mutex<CycleStore>>, tick_interval: Duration) -> Self {
        let (snapshots, _) = watch::channel(CountdownSnapshot::idle());
        Self {
            store,
            tick_interval,
            snapshots: Arc::new(snapshots),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn latest(&self) -> CountdownSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn publish(&self, snapshot: CountdownSnapshot) {
        self.snapshots.send_replace(snapshot);
    }

    pub fn start(&self) -> Result<Option<CountdownHandle>, InfraError> {
        let cycle_id = {
            let store = lock_store(&self.store)?;
            store.active_cycle().map(|cycle| cycle.id.clone())
        };
        let Some(cycle_id) = cycle_id else {
            return Ok(None);
        };

        let task = tokio::spawn(run_countdown(
            Arc::clone(&self.store),
            Arc::clone(&self.snapshots),
            self.tick_interval,
            cycle_id.clone(),
        ));
        tracing::debug!(cycle_id = %cycle_id, "countdown started");
        Ok(Some(CountdownHandle {
            cycle_id,
            task: Some(task),
        }))
    }
}

#[derive(Debug)]
pub struct CountdownHandle {
    cycle_id: String,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(cycle_id = %self.cycle_id, "countdown cancelled");
        }
    }

    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_countdown(
    store: Arc<Mutex<CycleStore>>,
    snapshots: Arc<watch::Sender<CountdownSnapshot>>,
    tick_interval: Duration,
    cycle_id: String,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let outcome = match tick_shared(&store, &cycle_id) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(cycle_id = %cycle_id, error = %error, "countdown stopped");
                return;
            }
        };

        match outcome {
            TickOutcome::Running(snapshot) => {
                snapshots.send_replace(snapshot);
            }
            TickOutcome::Finished(snapshot) => {
                snapshots.send_replace(snapshot);
                return;
            }
            TickOutcome::Stopped => {
                tracing::debug!(cycle_id = %cycle_id, "countdown stopped; cycle no longer active");
                return;
            }
        }
    }
}

fn tick_shared(store: &Mutex<CycleStore>, cycle_id: &str) -> Result<TickOutcome, InfraError> {
    let mut store = lock_store(store)?;
    Ok(tick(&mut store, cycle_id))
}

pub(crate) fn lock_store(
    store: &Mutex<CycleStore>,
) -> Result<std::sync::MutexGuard<'_, CycleStore>, InfraError> {
    store
        .lock()
        .map_err(|error| InfraError::InvalidState(format!("cycle store lock poisoned: {error}")))
}
