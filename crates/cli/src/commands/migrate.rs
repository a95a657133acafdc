use helpbot_db::migrations::{self, applied_versions, known_versions};
use serde::Serialize;

use crate::commands::{with_database, CommandFailure, CommandResult};

#[derive(Debug, Serialize)]
struct MigrateReport {
    /// Versions this run applied, oldest first.
    newly_applied: Vec<i64>,
    schema_version: Option<i64>,
    known_versions: usize,
}

pub fn run() -> CommandResult {
    let outcome = with_database(|pool| async move {
        let query_failed = |error: sqlx::Error| CommandFailure::new("query", error.to_string(), 5);

        let before = applied_versions(&pool).await.map_err(query_failed)?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;
        let after = applied_versions(&pool).await.map_err(query_failed)?;

        Ok(MigrateReport {
            newly_applied: after.difference(&before).copied().collect(),
            schema_version: after.last().copied(),
            known_versions: known_versions().len(),
        })
    });

    CommandResult::from_outcome("migrate", outcome)
}
