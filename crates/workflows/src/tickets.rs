//! Help-ticket lifecycle: one ticket per forum thread, open until a solution
//! is marked, then resolved for good.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;

use helpbot_core::clock::Clock;
use helpbot_core::domain::ticket::{ThreadId, Ticket, TicketPriority};
use helpbot_core::domain::user::UserId;
use helpbot_core::notifications::{Notification, NotificationRouter};
use helpbot_core::reputation::ReputationChange;
use helpbot_db::repositories::ticket::{self, NewTicket};
use helpbot_db::repositories::user;
use helpbot_db::{in_transaction, DbPool};

use crate::errors::TicketError;
use crate::ledger::{announce_level_change, apply_delta_in};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub ticket: Ticket,
    /// `None` for self-resolution, which awards nothing.
    pub reputation: Option<ReputationChange>,
}

impl Resolution {
    pub fn is_self_resolved(&self) -> bool {
        self.reputation.is_none()
    }
}

#[derive(Clone)]
pub struct TicketWorkflow {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    notifications: NotificationRouter,
    default_bounty: i64,
}

impl TicketWorkflow {
    pub fn new(
        pool: DbPool,
        clock: Arc<dyn Clock>,
        notifications: NotificationRouter,
        default_bounty: i64,
    ) -> Self {
        Self { pool, clock, notifications, default_bounty }
    }

    pub async fn open_ticket(
        &self,
        thread_id: ThreadId,
        owner: UserId,
        correlation_id: &str,
    ) -> Result<Ticket, TicketError> {
        let new_ticket = NewTicket {
            thread_id,
            owner,
            bounty: self.default_bounty,
            priority: TicketPriority::Regular,
            created_at: self.clock.now(),
        };

        let ticket =
            in_transaction(&self.pool, move |conn| Box::pin(open_in(conn, new_ticket))).await?;

        info!(
            event_name = "workflow.ticket.opened",
            correlation_id,
            ticket_id = %ticket.id,
            thread_id = %thread_id,
            owner_id = %owner,
            bounty = ticket.bounty,
            "ticket opened"
        );
        Ok(ticket)
    }

    pub async fn resolve_ticket(
        &self,
        thread_id: ThreadId,
        resolver: UserId,
        correlation_id: &str,
    ) -> Result<Resolution, TicketError> {
        let now = self.clock.now();
        let resolution = in_transaction(&self.pool, move |conn| {
            Box::pin(resolve_in(conn, thread_id, resolver, now))
        })
        .await?;

        info!(
            event_name = "workflow.ticket.resolved",
            correlation_id,
            ticket_id = %resolution.ticket.id,
            thread_id = %thread_id,
            resolver_id = %resolver,
            self_resolved = resolution.is_self_resolved(),
            "ticket resolved"
        );

        self.notifications
            .publish(
                Notification::TicketResolved {
                    ticket_id: resolution.ticket.id,
                    thread_id,
                    resolver_id: resolver,
                    self_resolved: resolution.is_self_resolved(),
                },
                correlation_id,
            )
            .await;
        if let Some(change) = &resolution.reputation {
            announce_level_change(&self.notifications, resolver, change, correlation_id).await;
        }

        Ok(resolution)
    }

    pub async fn find(&self, thread_id: ThreadId) -> Result<Option<Ticket>, TicketError> {
        Ok(ticket::find_by_thread(&self.pool, thread_id).await?)
    }
}

async fn open_in(conn: &mut SqliteConnection, new_ticket: NewTicket) -> Result<Ticket, TicketError> {
    let thread_id = new_ticket.thread_id;
    let created = ticket::insert(&mut *conn, &new_ticket).await.map_err(|error| {
        if error.is_unique_violation() {
            TicketError::AlreadyExists { thread_id }
        } else {
            TicketError::Repository(error)
        }
    })?;

    let mut owner = user::ensure(&mut *conn, created.owner).await?;
    owner.record_question_asked();
    user::save(&mut *conn, &owner).await?;

    Ok(created)
}

/// Status change, counter and bounty commit together or not at all.
async fn resolve_in(
    conn: &mut SqliteConnection,
    thread_id: ThreadId,
    resolver: UserId,
    now: DateTime<Utc>,
) -> Result<Resolution, TicketError> {
    // Write first so this transaction owns the write lock before it reads.
    let mut resolver_record = user::ensure(&mut *conn, resolver).await?;

    let mut current = ticket::find_by_thread(&mut *conn, thread_id)
        .await?
        .ok_or(TicketError::NotFound { thread_id })?;
    current.resolve(resolver, now).map_err(|_| TicketError::AlreadyResolved { thread_id })?;

    let resolved = ticket::mark_resolved(&mut *conn, thread_id, resolver, now)
        .await?
        .ok_or(TicketError::AlreadyResolved { thread_id })?;

    if resolved.is_self_resolved() {
        return Ok(Resolution { ticket: resolved, reputation: None });
    }

    resolver_record.record_question_resolved();
    user::save(&mut *conn, &resolver_record).await?;
    let change = apply_delta_in(&mut *conn, resolver, resolved.bounty).await?;

    Ok(Resolution { ticket: resolved, reputation: Some(change) })
}
