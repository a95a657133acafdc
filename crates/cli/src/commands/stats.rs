use chrono::{DateTime, Utc};
use helpbot_core::domain::review::Review;
use helpbot_db::repositories::{review, ticket, user, RepositoryError};
use helpbot_db::DbPool;
use serde::Serialize;

use crate::commands::{with_database, CommandFailure, CommandResult};

#[derive(Debug, Serialize)]
struct StatsReport {
    users: i64,
    open_tickets: i64,
    resolved_tickets: i64,
    active_review: Option<ActiveReview>,
}

#[derive(Debug, Serialize)]
struct ActiveReview {
    id: i64,
    started_at: String,
    closes_at: String,
    participants: usize,
}

pub fn run() -> CommandResult {
    let outcome = with_database(|pool| async move {
        collect(&pool, Utc::now()).await.map_err(|error| {
            CommandFailure::new("query", format!("{error}; has `helpbot migrate` run?"), 5)
        })
    });

    CommandResult::from_outcome("stats", outcome)
}

async fn collect(pool: &DbPool, now: DateTime<Utc>) -> Result<StatsReport, RepositoryError> {
    let users = user::count(pool).await?;
    let tickets = ticket::counts(pool).await?;
    let active_review = match review::find_open_at(pool, now).await? {
        Some(open) => Some(describe(pool, open).await?),
        None => None,
    };

    Ok(StatsReport {
        users,
        open_tickets: tickets.open,
        resolved_tickets: tickets.resolved,
        active_review,
    })
}

async fn describe(pool: &DbPool, open: Review) -> Result<ActiveReview, RepositoryError> {
    let participants = review::list_participants(pool, open.id).await?;
    Ok(ActiveReview {
        id: open.id.0,
        started_at: open.started_at.to_rfc3339(),
        closes_at: open.closed_at.to_rfc3339(),
        participants: participants.len(),
    })
}
