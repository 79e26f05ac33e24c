pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bridge::run_bridge;
use application::commands::{resume_countdown_impl, AppState};
use infrastructure::error::InfraError;
use std::path::PathBuf;
use tokio::io::BufReader;

pub use application::countdown_driver::{CountdownDriver, CountdownHandle, TickOutcome};
pub use application::cycle_store::CycleStore;
pub use domain::countdown::CountdownSnapshot;
pub use domain::models::{Cycle, CycleState, CycleStatus, NewCycle};
pub use domain::reducer::{cycle_reducer, CycleAction};

const WORKSPACE_ENV: &str = "POMOCYCLE_WORKSPACE";

fn resolve_workspace_root() -> Result<PathBuf, InfraError> {
    match std::env::var_os(WORKSPACE_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(std::env::current_dir()?),
    }
}

pub async fn run() -> Result<(), InfraError> {
    let workspace_root = resolve_workspace_root()?;
    let state = AppState::new(workspace_root.clone())?;
    tracing::info!(
        workspace_root = %workspace_root.display(),
        database_path = %state.database_path().display(),
        "workspace ready"
    );

    if let Some(snapshot) = resume_countdown_impl(&state).await? {
        tracing::info!(
            cycle_id = ?snapshot.cycle_id,
            remaining = %snapshot.display,
            "resumed active cycle"
        );
    }

    run_bridge(
        &state,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}
