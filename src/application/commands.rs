use crate::application::bootstrap::bootstrap_workspace;
use crate::application::countdown_driver::{lock_store, CountdownDriver, CountdownHandle};
use crate::application::cycle_store::{CycleStore, NowProvider};
use crate::domain::countdown::{format_countdown, remaining_seconds, CountdownSnapshot};
use crate::domain::models::{Cycle, CycleStatus, NewCycle};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot_store::{SnapshotStore, SqliteSnapshotStore};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

const SUMMARY_DEFAULT_DAYS: i64 = 7;

pub struct AppState {
    config: AppConfig,
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    timezone: Tz,
    store: Arc<Mutex<CycleStore>>,
    driver: CountdownDriver,
    countdown: Mutex<Option<CountdownHandle>>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::with_now_provider(workspace_root, Arc::new(Utc::now))
    }

    pub fn with_now_provider(
        workspace_root: PathBuf,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let timezone = bootstrap.config.tz()?;
        let snapshot_store: Arc<dyn SnapshotStore> =
            Arc::new(SqliteSnapshotStore::new(&bootstrap.database_path));

        let mut store = CycleStore::new(snapshot_store, bootstrap.config.storage_key.clone())
            .with_now_provider(now_provider);
        store.restore();
        let store = Arc::new(Mutex::new(store));
        let driver = CountdownDriver::new(Arc::clone(&store), bootstrap.config.tick_interval());

        Ok(Self {
            config: bootstrap.config,
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            timezone,
            store,
            driver,
            countdown: Mutex::new(None),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownSnapshot> {
        self.driver.subscribe()
    }

    pub fn stop_countdown(&self) {
        match lock_countdown(self) {
            Ok(mut countdown) => {
                if let Some(handle) = countdown.take() {
                    handle.cancel();
                }
            }
            Err(error) => self.log_error("stop_countdown", &error.to_string()),
        }
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command = command, "{message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        tracing::error!(command = command, "{message}");
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn restart_countdown(&self) -> Result<(), InfraError> {
        let mut countdown = lock_countdown(self)?;
        if let Some(previous) = countdown.take() {
            previous.cancel();
        }
        *countdown = self.driver.start()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleStateResponse {
    pub cycles: Vec<Cycle>,
    pub active_cycle_id: Option<String>,
    pub active_cycle: Option<Cycle>,
    pub amount_seconds_passed: u32,
    pub remaining_seconds: u32,
    pub countdown: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleHistoryItem {
    pub id: String,
    pub task: String,
    pub target_minutes: u32,
    pub status: String,
    pub started_at: String,
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummaryResponse {
    pub start: String,
    pub end: String,
    pub finished_count: u32,
    pub interrupted_count: u32,
    pub in_progress_count: u32,
    pub total_focus_minutes: i64,
    pub cycles: Vec<CycleHistoryItem>,
}

pub async fn create_cycle_impl(
    state: &AppState,
    task: String,
    minutes_amount: u32,
) -> Result<CycleStateResponse, InfraError> {
    let new_cycle = NewCycle::new(task.trim(), minutes_amount);
    new_cycle.validate().map_err(InfraError::InvalidInput)?;

    let cycle = {
        let mut store = lock_store(&state.store)?;
        if let Some(active) = store.active_cycle() {
            return Err(InfraError::InvalidState(format!(
                "cycle already in progress: {}",
                active.id
            )));
        }
        store.create(new_cycle)
    };
    state.restart_countdown()?;

    state.log_info(
        "create_cycle",
        &format!(
            "created cycle_id={} target_minutes={}",
            cycle.id, cycle.target_minutes
        ),
    );
    get_cycle_state_impl(state)
}

pub fn interrupt_cycle_impl(state: &AppState) -> Result<CycleStateResponse, InfraError> {
    if let Some(handle) = lock_countdown(state)?.take() {
        handle.cancel();
    }

    let (interrupted, seconds_passed) = {
        let mut store = lock_store(&state.store)?;
        let interrupted = store.interrupt_active();
        (interrupted, store.amount_seconds_passed())
    };

    match interrupted {
        Some(cycle) => {
            state
                .driver
                .publish(CountdownSnapshot::for_cycle(&cycle, seconds_passed, false));
            state.log_info(
                "interrupt_cycle",
                &format!("interrupted cycle_id={} after {seconds_passed}s", cycle.id),
            );
        }
        None => state.log_info("interrupt_cycle", "no active cycle to interrupt"),
    }
    get_cycle_state_impl(state)
}

pub fn get_cycle_state_impl(state: &AppState) -> Result<CycleStateResponse, InfraError> {
    let store = lock_store(&state.store)?;
    let active_cycle = store.active_cycle().cloned();
    let seconds_passed = store.amount_seconds_passed();
    let remaining = active_cycle
        .as_ref()
        .map(|cycle| remaining_seconds(cycle.target_minutes, seconds_passed))
        .unwrap_or(0);

    Ok(CycleStateResponse {
        cycles: store.cycles().to_vec(),
        active_cycle_id: store.active_cycle_id().map(ToOwned::to_owned),
        active_cycle,
        amount_seconds_passed: seconds_passed,
        remaining_seconds: remaining,
        countdown: format_countdown(remaining),
    })
}

pub fn list_cycles_impl(state: &AppState) -> Result<Vec<CycleHistoryItem>, InfraError> {
    let store = lock_store(&state.store)?;
    Ok(store
        .cycles()
        .iter()
        .map(|cycle| to_history_item(cycle, &state.timezone))
        .collect())
}

pub fn get_cycle_summary_impl(
    state: &AppState,
    start: Option<String>,
    end: Option<String>,
) -> Result<CycleSummaryResponse, InfraError> {
    let store = lock_store(&state.store)?;
    let now = store.now();
    let start = match start {
        Some(raw) => parse_datetime_input(&raw, "start")?,
        None => now - Duration::days(SUMMARY_DEFAULT_DAYS),
    };
    let end = match end {
        Some(raw) => parse_datetime_input(&raw, "end")?,
        None => now,
    };
    if end <= start {
        return Err(InfraError::InvalidInput(
            "end must be greater than start".to_string(),
        ));
    }

    let in_range = store
        .cycles()
        .iter()
        .filter(|cycle| cycle.started_at >= start && cycle.started_at <= end)
        .collect::<Vec<_>>();
    let count_status = |status: CycleStatus| {
        in_range
            .iter()
            .filter(|cycle| cycle.status() == status)
            .count() as u32
    };
    let finished_count = count_status(CycleStatus::Finished);
    let interrupted_count = count_status(CycleStatus::Interrupted);
    let in_progress_count = count_status(CycleStatus::InProgress);
    let total_focus_minutes = in_range
        .iter()
        .filter_map(|cycle| {
            cycle.ended_at().map(|ended_at| {
                (ended_at - cycle.started_at)
                    .num_minutes()
                    .clamp(0, i64::from(cycle.target_minutes))
            })
        })
        .sum();

    Ok(CycleSummaryResponse {
        start: start.to_rfc3339(),
        end: end.to_rfc3339(),
        finished_count,
        interrupted_count,
        in_progress_count,
        total_focus_minutes,
        cycles: in_range
            .into_iter()
            .map(|cycle| to_history_item(cycle, &state.timezone))
            .collect(),
    })
}

pub async fn resume_countdown_impl(
    state: &AppState,
) -> Result<Option<CountdownSnapshot>, InfraError> {
    let snapshot = {
        let store = lock_store(&state.store)?;
        store
            .active_cycle()
            .map(|cycle| CountdownSnapshot::for_cycle(cycle, store.amount_seconds_passed(), true))
    };
    let Some(snapshot) = snapshot else {
        return Ok(None);
    };

    state.driver.publish(snapshot.clone());
    state.restart_countdown()?;
    state.log_info(
        "resume_countdown",
        &format!(
            "resumed cycle_id={} at {}s",
            snapshot.cycle_id.as_deref().unwrap_or_default(),
            snapshot.elapsed_seconds
        ),
    );
    Ok(Some(snapshot))
}

fn lock_countdown(state: &AppState) -> Result<MutexGuard<'_, Option<CountdownHandle>>, InfraError> {
    state
        .countdown
        .lock()
        .map_err(|error| InfraError::InvalidState(format!("countdown lock poisoned: {error}")))
}

fn to_history_item(cycle: &Cycle, timezone: &Tz) -> CycleHistoryItem {
    CycleHistoryItem {
        id: cycle.id.clone(),
        task: cycle.task.clone(),
        target_minutes: cycle.target_minutes,
        status: cycle.status().as_str().to_string(),
        started_at: cycle.started_at.with_timezone(timezone).to_rfc3339(),
        ended_at: cycle
            .ended_at()
            .map(|value| value.with_timezone(timezone).to_rfc3339()),
    }
}

fn parse_datetime_input(value: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
            InfraError::InvalidInput(format!("{field_name} has no midnight"))
        })?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    Err(InfraError::InvalidInput(format!(
        "{field_name} must be RFC3339 or YYYY-MM-DD"
    )))
}
