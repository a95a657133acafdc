use helpbot_core::config::{AppConfig, LoadOptions};
use helpbot_db::{connect, migrations, ping};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exits 0 only when every check passed.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        return CommandResult::checked("doctor", passed, &report);
    }

    CommandResult { exit_code: if passed { 0 } else { 1 }, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_bot_token(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["bot_token_readiness", "database_connectivity", "schema_migrations"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    let segments = config.discord.bot_token.expose_secret().split('.').count();
    let unset_ids = [
        ("guild_id", config.discord.guild_id),
        ("bot_messages_channel_id", config.discord.bot_messages_channel_id),
        ("helper_role_id", config.discord.helper_role_id),
        ("owner_id", config.discord.owner_id),
    ]
    .into_iter()
    .filter(|(_, id)| *id <= 0)
    .map(|(name, _)| name)
    .collect::<Vec<_>>();

    let details = if unset_ids.is_empty() {
        format!("bot token has {segments} segments; all guild ids configured")
    } else {
        format!(
            "bot token has {segments} segments; unset optional ids: {}",
            unset_ids.join(", ")
        )
    };
    DoctorCheck { name: "bot_token_readiness", status: CheckStatus::Pass, details }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck {
                        name: "schema_migrations",
                        status: CheckStatus::Skipped,
                        details: "skipped because the database is unreachable".to_string(),
                    },
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            Err(error) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("database query failed: {error}"),
            },
        };

        let known = migrations::known_versions();
        let schema = match migrations::applied_versions(&pool).await {
            Ok(applied) => {
                let missing = known.difference(&applied).copied().collect::<Vec<_>>();
                if missing.is_empty() {
                    DoctorCheck {
                        name: "schema_migrations",
                        status: CheckStatus::Pass,
                        details: format!("{} of {} migrations applied", applied.len(), known.len()),
                    }
                } else {
                    DoctorCheck {
                        name: "schema_migrations",
                        status: CheckStatus::Fail,
                        details: format!(
                            "pending migration versions {missing:?}; run `helpbot migrate`"
                        ),
                    }
                }
            }
            Err(error) => DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Fail,
                details: format!("could not read migration history: {error}"),
            },
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
