pub mod config;
pub mod doctor;
pub mod migrate;
pub mod stats;

use std::future::Future;

use helpbot_core::config::{AppConfig, LoadOptions};
use helpbot_db::{connect, DbPool};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a database-backed command stopped, with the exit code it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl CommandFailure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    #[serde(flatten)]
    body: T,
}

#[derive(Serialize)]
struct Message<'a> {
    message: &'a str,
}

impl CommandResult {
    /// Successful run; the fields of `body` sit next to `command` and `status`.
    pub fn report<T: Serialize>(command: &str, body: T) -> Self {
        let envelope = Envelope { command, status: "ok", error_class: None, body };
        Self { exit_code: 0, output: render(command, &envelope) }
    }

    /// Readiness-style report: exits 1 with status `fail` unless `passed`.
    pub fn checked<T: Serialize>(command: &str, passed: bool, body: T) -> Self {
        let status = if passed { "ok" } else { "fail" };
        let envelope = Envelope { command, status, error_class: None, body };
        Self { exit_code: if passed { 0 } else { 1 }, output: render(command, &envelope) }
    }

    pub fn failure(command: &str, failure: CommandFailure) -> Self {
        let envelope = Envelope {
            command,
            status: "error",
            error_class: Some(failure.error_class),
            body: Message { message: &failure.message },
        };
        Self { exit_code: failure.exit_code, output: render(command, &envelope) }
    }

    pub fn from_outcome<T: Serialize>(command: &str, outcome: Result<T, CommandFailure>) -> Self {
        match outcome {
            Ok(body) => Self::report(command, body),
            Err(failure) => Self::failure(command, failure),
        }
    }
}

/// Loads config, connects, and runs `work` on a current-thread runtime. The
/// pool is closed before returning.
pub fn with_database<T, F, Fut>(work: F) -> Result<T, CommandFailure>
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<T, CommandFailure>>,
{
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::new("config_validation", format!("configuration issue: {error}"), 2)
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandFailure::new(
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        },
    )?;

    runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))?;
        let outcome = work(pool.clone()).await;
        pool.close().await;
        outcome
    })
}

fn render<T: Serialize>(command: &str, payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"{command}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::Value;

    use super::{CommandFailure, CommandResult};

    #[derive(Serialize)]
    struct Counts {
        users: i64,
    }

    #[test]
    fn report_flattens_the_body_beside_the_status() {
        let result = CommandResult::report("stats", Counts { users: 3 });

        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["command"], "stats");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["users"], 3);
        assert!(payload.get("error_class").is_none());
    }

    #[test]
    fn failure_carries_class_message_and_exit_code() {
        let result = CommandResult::from_outcome::<Counts>(
            "migrate",
            Err(CommandFailure::new("migration", "checksum mismatch", 5)),
        );

        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(result.exit_code, 5);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "migration");
        assert_eq!(payload["message"], "checksum mismatch");
    }
}
