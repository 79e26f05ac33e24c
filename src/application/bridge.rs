use crate::application::commands::{
    create_cycle_impl, get_cycle_state_impl, get_cycle_summary_impl, interrupt_cycle_impl,
    list_cycles_impl, AppState,
};
use crate::domain::countdown::CountdownSnapshot;
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    Ping,
    CreateCycle {
        task: String,
        #[serde(rename = "minutesAmount", alias = "minutes_amount")]
        minutes_amount: u32,
    },
    InterruptCycle,
    GetCycleState,
    ListCycles,
    GetCycleSummary {
        #[serde(default)]
        start: Option<String>,
        #[serde(default)]
        end: Option<String>,
    },
}

impl BridgeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::CreateCycle { .. } => "create_cycle",
            Self::InterruptCycle => "interrupt_cycle",
            Self::GetCycleState => "get_cycle_state",
            Self::ListCycles => "list_cycles",
            Self::GetCycleSummary { .. } => "get_cycle_summary",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    fn success(command: &str, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            command: Some(command.to_string()),
            data: Some(data),
            error: None,
        }
    }

    fn failure(command: Option<&str>, error: String) -> Self {
        Self {
            ok: false,
            command: command.map(ToOwned::to_owned),
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BridgeEvent {
    pub event: &'static str,
    pub data: CountdownSnapshot,
}

pub async fn dispatch_command(state: &AppState, command: BridgeCommand) -> BridgeResponse {
    let name = command.name();
    let result = match command {
        BridgeCommand::Ping => Ok(serde_json::Value::String("pong".to_string())),
        BridgeCommand::CreateCycle {
            task,
            minutes_amount,
        } => create_cycle_impl(state, task, minutes_amount)
            .await
            .and_then(to_value),
        BridgeCommand::InterruptCycle => interrupt_cycle_impl(state).and_then(to_value),
        BridgeCommand::GetCycleState => get_cycle_state_impl(state).and_then(to_value),
        BridgeCommand::ListCycles => list_cycles_impl(state).and_then(to_value),
        BridgeCommand::GetCycleSummary { start, end } => {
            get_cycle_summary_impl(state, start, end).and_then(to_value)
        }
    };

    match result {
        Ok(data) => BridgeResponse::success(name, data),
        Err(error) => BridgeResponse::failure(Some(name), state.command_error(name, &error)),
    }
}

pub async fn run_bridge<R, W>(state: &AppState, reader: R, writer: W) -> Result<(), InfraError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));

    let mut countdown = state.subscribe_countdown();
    let event_writer = Arc::clone(&writer);
    let forwarder = tokio::spawn(async move {
        while countdown.changed().await.is_ok() {
            let event = BridgeEvent {
                event: "countdown",
                data: countdown.borrow_and_update().clone(),
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    tracing::error!(error = %error, "failed to serialize countdown event; skipping");
                    continue;
                }
            };
            let mut writer = event_writer.lock().await;
            if let Err(error) = write_line(&mut *writer, &json).await {
                tracing::warn!(error = %error, "failed to write countdown event; stopping forwarder");
                break;
            }
        }
    });

    let mut lines = reader.lines();
    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("input closed; shutting down bridge");
                break Ok(());
            }
            Err(error) => break Err(InfraError::from(error)),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<BridgeCommand>(trimmed) {
            Ok(command) => dispatch_command(state, command).await,
            Err(error) => {
                tracing::warn!(error = %error, raw_line = %trimmed, "failed to parse bridge command");
                BridgeResponse::failure(None, format!("failed to parse command: {error}"))
            }
        };
        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(error) => break Err(InfraError::from(error)),
        };
        let mut writer = writer.lock().await;
        if let Err(error) = write_line(&mut *writer, &json).await {
            break Err(InfraError::from(error));
        }
    };

    forwarder.abort();
    let _ = forwarder.await;
    state.stop_countdown();
    result
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value, InfraError> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cycle_store::tests::ManualClock;
    use std::fs;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, BufReader};

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pomocycle-bridge-tests-{name}-{}", std::process::id()))
    }

    #[test]
    fn commands_parse_from_tagged_json() {
        let create: BridgeCommand =
            serde_json::from_str(r#"{"command":"create_cycle","task":"Read","minutesAmount":25}"#)
                .expect("parse create");
        assert_eq!(
            create,
            BridgeCommand::CreateCycle {
                task: "Read".to_string(),
                minutes_amount: 25,
            }
        );

        let summary: BridgeCommand =
            serde_json::from_str(r#"{"command":"get_cycle_summary"}"#).expect("parse summary");
        assert_eq!(
            summary,
            BridgeCommand::GetCycleSummary {
                start: None,
                end: None,
            }
        );
        assert!(serde_json::from_str::<BridgeCommand>(r#"{"command":"explode"}"#).is_err());
    }

    #[tokio::test]
    async fn dispatch_reports_errors_with_command_name() {
        let root = temp_root("dispatch");
        let clock = ManualClock::starting_at("2026-02-16T09:00:00Z");
        let state = AppState::with_now_provider(root.clone(), clock.provider()).expect("app state");

        let response = dispatch_command(
            &state,
            BridgeCommand::CreateCycle {
                task: "Too short".to_string(),
                minutes_amount: 3,
            },
        )
        .await;
        assert!(!response.ok);
        assert_eq!(response.command.as_deref(), Some("create_cycle"));
        assert!(response
            .error
            .as_deref()
            .is_some_and(|error| error.contains("at least 5")));

        let pong = dispatch_command(&state, BridgeCommand::Ping).await;
        assert_eq!(pong.data, Some(serde_json::json!("pong")));

        drop(state);
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn bridge_answers_each_line_until_eof() {
        let root = temp_root("session");
        let clock = ManualClock::starting_at("2026-02-16T09:00:00Z");
        let state = AppState::with_now_provider(root.clone(), clock.provider()).expect("app state");

        let input = [
            r#"{"command":"ping"}"#,
            "",
            "not json",
            r#"{"command":"create_cycle","task":"Write spec","minutesAmount":5}"#,
            r#"{"command":"interrupt_cycle"}"#,
            r#"{"command":"list_cycles"}"#,
        ]
        .join("\n");
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        run_bridge(&state, input.as_bytes(), server)
            .await
            .expect("run bridge");
        let mut output = String::new();
        client
            .read_to_string(&mut output)
            .await
            .expect("read bridge output");

        let responses = output
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("json line"))
            .filter(|value| value.get("event").is_none())
            .collect::<Vec<_>>();
        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0]["data"], "pong");
        assert_eq!(responses[1]["ok"], false);
        assert_eq!(responses[2]["ok"], true);
        assert_eq!(responses[2]["data"]["countdown"], "05:00");
        assert_eq!(responses[3]["data"]["activeCycleId"], serde_json::Value::Null);
        assert_eq!(responses[4]["data"][0]["status"], "interrupted");

        drop(state);
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn bridge_forwards_countdown_events_while_a_cycle_runs() {
        let root = temp_root("events");
        let clock = ManualClock::starting_at("2026-02-16T09:00:00Z");
        let state = AppState::with_now_provider(root.clone(), clock.provider()).expect("app state");

        let (mut input, bridge_input) = tokio::io::duplex(4 * 1024);
        let (bridge_output, output) = tokio::io::duplex(64 * 1024);
        let client = async move {
            input
                .write_all(b"{\"command\":\"create_cycle\",\"task\":\"Focus\",\"minutesAmount\":5}\n")
                .await
                .expect("write command");
            let mut lines = BufReader::new(output).lines();
            let mut countdown = None;
            while let Some(line) = lines.next_line().await.expect("read bridge output") {
                let value = serde_json::from_str::<serde_json::Value>(&line).expect("json line");
                if value["event"] == "countdown" && value["data"]["running"] == true {
                    countdown = Some(value);
                    break;
                }
            }
            drop(input);
            (countdown, lines)
        };

        let (result, (countdown, _lines)) =
            tokio::join!(run_bridge(&state, BufReader::new(bridge_input), bridge_output), client);
        result.expect("run bridge");

        let countdown = countdown.expect("countdown event");
        assert_eq!(countdown["data"]["display"], "05:00");
        assert_eq!(countdown["data"]["remainingSeconds"], 300);
        assert!(countdown["data"]["cycleId"].is_string());

        drop(state);
        let _ = fs::remove_dir_all(&root);
    }
}
