//! Reputation ledger: persisted reputation and level per member.

use sqlx::SqliteConnection;
use tracing::info;

use helpbot_core::domain::user::{User, UserId};
use helpbot_core::notifications::{Notification, NotificationRouter};
use helpbot_core::reputation::{remaining_to_next_level, ReputationChange};
use helpbot_db::repositories::user;
use helpbot_db::{in_transaction, DbPool, RepositoryError};

use crate::errors::LedgerError;

/// A member's reputation as shown to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub user: User,
    /// `None` once the member has reached the last level.
    pub remaining_to_next_level: Option<i64>,
}

#[derive(Clone)]
pub struct ReputationLedger {
    pool: DbPool,
    notifications: NotificationRouter,
}

impl ReputationLedger {
    pub fn new(pool: DbPool, notifications: NotificationRouter) -> Self {
        Self { pool, notifications }
    }

    pub async fn apply_delta(
        &self,
        user_id: UserId,
        amount: i64,
        correlation_id: &str,
    ) -> Result<ReputationChange, LedgerError> {
        let change = in_transaction(&self.pool, move |conn| {
            Box::pin(apply_delta_in(conn, user_id, amount))
        })
        .await?;

        info!(
            event_name = "workflow.ledger.delta_applied",
            correlation_id,
            user_id = %user_id,
            amount,
            reputation = change.reputation,
            level = change.new_level,
            "reputation updated"
        );
        announce_level_change(&self.notifications, user_id, &change, correlation_id).await;
        Ok(change)
    }

    pub async fn set_absolute(
        &self,
        user_id: UserId,
        amount: i64,
        correlation_id: &str,
    ) -> Result<ReputationChange, LedgerError> {
        let change = in_transaction(&self.pool, move |conn| {
            Box::pin(set_absolute_in(conn, user_id, amount))
        })
        .await?;

        info!(
            event_name = "workflow.ledger.reputation_set",
            correlation_id,
            user_id = %user_id,
            reputation = change.reputation,
            level = change.new_level,
            "reputation set"
        );
        announce_level_change(&self.notifications, user_id, &change, correlation_id).await;
        Ok(change)
    }

    /// Current standing; unknown members are registered on first lookup.
    pub async fn standing(&self, user_id: UserId) -> Result<Standing, LedgerError> {
        let user = user::ensure(&self.pool, user_id).await?;
        let remaining_to_next_level = remaining_to_next_level(user.reputation, user.level);
        Ok(Standing { user, remaining_to_next_level })
    }

    pub async fn remaining_to_next_level(&self, user_id: UserId) -> Result<Option<i64>, LedgerError> {
        Ok(self.standing(user_id).await?.remaining_to_next_level)
    }
}

/// Read-modify-write of one member's reputation on an open transaction.
///
/// `user::ensure` writes first, so the transaction holds SQLite's write lock
/// for the whole update and concurrent awards to the same member serialize.
pub async fn apply_delta_in(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: i64,
) -> Result<ReputationChange, RepositoryError> {
    let mut member = user::ensure(&mut *conn, user_id).await?;
    let change = member.apply_reputation_delta(amount);
    user::save(&mut *conn, &member).await?;
    Ok(change)
}

async fn set_absolute_in(
    conn: &mut SqliteConnection,
    user_id: UserId,
    amount: i64,
) -> Result<ReputationChange, RepositoryError> {
    let mut member = user::ensure(&mut *conn, user_id).await?;
    let change = member.set_reputation(amount);
    user::save(&mut *conn, &member).await?;
    Ok(change)
}

pub(crate) async fn announce_level_change(
    notifications: &NotificationRouter,
    user_id: UserId,
    change: &ReputationChange,
    correlation_id: &str,
) {
    if change.is_level_up() {
        notifications
            .publish(
                Notification::UserLeveledUp { user_id, new_level: change.new_level },
                correlation_id,
            )
            .await;
    }
}
