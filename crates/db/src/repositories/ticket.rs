use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite};

use helpbot_core::domain::ticket::{ThreadId, Ticket, TicketId, TicketPriority, TicketStatus};
use helpbot_core::domain::user::UserId;

use super::{encode_timestamp, parse_optional_timestamp, parse_timestamp, RepositoryError};

const TICKET_COLUMNS: &str =
    "id, thread_id, owner_id, helper_id, bounty, status, priority, created_at, resolved_at";

#[derive(Clone, Debug)]
pub struct NewTicket {
    pub thread_id: ThreadId,
    pub owner: UserId,
    pub bounty: i64,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TicketCounts {
    pub open: i64,
    pub resolved: i64,
}

/// Fails with a unique violation if the thread already has a ticket.
pub async fn insert<'e, E>(executor: E, ticket: &NewTicket) -> Result<Ticket, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "INSERT INTO tickets (thread_id, owner_id, bounty, status, priority, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {TICKET_COLUMNS}"
    ))
    .bind(ticket.thread_id.0)
    .bind(ticket.owner.0)
    .bind(ticket.bounty)
    .bind(TicketStatus::Created.as_str())
    .bind(ticket.priority.as_str())
    .bind(encode_timestamp(ticket.created_at))
    .fetch_one(executor)
    .await?;

    ticket_from_row(row)
}

pub async fn find_by_thread<'e, E>(
    executor: E,
    thread_id: ThreadId,
) -> Result<Option<Ticket>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE thread_id = ?"))
        .bind(thread_id.0)
        .fetch_optional(executor)
        .await?;

    row.map(ticket_from_row).transpose()
}

/// Check-and-set resolution. Returns `None` when no unresolved ticket exists
/// for the thread, leaving the row untouched.
pub async fn mark_resolved<'e, E>(
    executor: E,
    thread_id: ThreadId,
    helper: UserId,
    resolved_at: DateTime<Utc>,
) -> Result<Option<Ticket>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "UPDATE tickets
         SET status = ?, helper_id = ?, resolved_at = ?
         WHERE thread_id = ? AND status != ?
         RETURNING {TICKET_COLUMNS}"
    ))
    .bind(TicketStatus::Resolved.as_str())
    .bind(helper.0)
    .bind(encode_timestamp(resolved_at))
    .bind(thread_id.0)
    .bind(TicketStatus::Resolved.as_str())
    .fetch_optional(executor)
    .await?;

    row.map(ticket_from_row).transpose()
}

pub async fn counts<'e, E>(executor: E) -> Result<TicketCounts, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT
            COALESCE(SUM(CASE WHEN status = 'resolved' THEN 0 ELSE 1 END), 0) AS open,
            COALESCE(SUM(CASE WHEN status = 'resolved' THEN 1 ELSE 0 END), 0) AS resolved
         FROM tickets",
    )
    .fetch_one(executor)
    .await?;

    Ok(TicketCounts { open: row.try_get("open")?, resolved: row.try_get("resolved")? })
}

fn ticket_from_row(row: SqliteRow) -> Result<Ticket, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = TicketStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown ticket status `{status_raw}`")))?;
    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = TicketPriority::parse(&priority_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown ticket priority `{priority_raw}`"))
    })?;

    Ok(Ticket {
        id: TicketId(row.try_get("id")?),
        thread_id: ThreadId(row.try_get("thread_id")?),
        owner: UserId(row.try_get("owner_id")?),
        helper: row.try_get::<Option<i64>, _>("helper_id")?.map(UserId),
        bounty: row.try_get("bounty")?,
        status,
        priority,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        resolved_at: parse_optional_timestamp("resolved_at", row.try_get("resolved_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use helpbot_core::domain::ticket::{ThreadId, TicketPriority, TicketStatus};
    use helpbot_core::domain::user::UserId;

    use super::{counts, find_by_thread, insert, mark_resolved, NewTicket};
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        pool
    }

    fn new_ticket(thread: i64) -> NewTicket {
        NewTicket {
            thread_id: ThreadId(thread),
            owner: UserId(10),
            bounty: 5,
            priority: TicketPriority::Regular,
            created_at: Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn second_ticket_for_same_thread_is_a_unique_violation() {
        let pool = pool().await;
        insert(&pool, &new_ticket(500)).await.expect("first insert");

        let error = insert(&pool, &new_ticket(500)).await.expect_err("duplicate thread");
        assert!(error.is_unique_violation());
    }

    #[tokio::test]
    async fn mark_resolved_applies_only_once() {
        let pool = pool().await;
        insert(&pool, &new_ticket(501)).await.expect("insert");
        let at = Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap();

        let resolved = mark_resolved(&pool, ThreadId(501), UserId(11), at)
            .await
            .expect("resolve")
            .expect("ticket was open");
        assert_eq!(resolved.status, TicketStatus::Resolved);
        assert_eq!(resolved.helper, Some(UserId(11)));
        assert_eq!(resolved.resolved_at, Some(at));

        let again = mark_resolved(&pool, ThreadId(501), UserId(12), at).await.expect("resolve");
        assert!(again.is_none());

        let stored = find_by_thread(&pool, ThreadId(501)).await.expect("find").expect("exists");
        assert_eq!(stored.helper, Some(UserId(11)));
    }

    #[tokio::test]
    async fn counts_split_open_and_resolved() {
        let pool = pool().await;
        insert(&pool, &new_ticket(1)).await.expect("insert");
        insert(&pool, &new_ticket(2)).await.expect("insert");
        mark_resolved(&pool, ThreadId(2), UserId(3), Utc::now()).await.expect("resolve");

        let counts = counts(&pool).await.expect("counts");
        assert_eq!((counts.open, counts.resolved), (1, 1));
    }
}
