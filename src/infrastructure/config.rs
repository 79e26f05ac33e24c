use crate::infrastructure::error::InfraError;
use crate::infrastructure::snapshot_store::CYCLES_STATE_KEY;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            app_name: default_app_name(),
            timezone: default_timezone(),
            tick_interval_ms: default_tick_interval_ms(),
            storage_key: default_storage_key(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.schema != 1 {
            return Err(InfraError::InvalidConfig(format!(
                "unsupported schema {} in {APP_JSON}",
                self.schema
            )));
        }
        self.tz()?;
        if self.tick_interval_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "tickIntervalMs must be > 0".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(InfraError::InvalidConfig(
                "storageKey must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, InfraError> {
        self.timezone.trim().parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{}': {error}", self.timezone))
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_app_name() -> String {
    "PomoCycle".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_storage_key() -> String {
    CYCLES_STATE_KEY.to_string()
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    if parsed.get("schema").and_then(serde_json::Value::as_u64).is_none() {
        return Err(InfraError::InvalidConfig(format!(
            "missing schema in {}",
            path.display()
        )));
    }
    let config: AppConfig = serde_json::from_value(parsed)?;
    config.validate()?;
    Ok(config)
}
