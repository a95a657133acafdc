use tracing::info;

use helpbot_core::domain::member::{subscription_level, RoleId, SubscriptionTier};
use helpbot_core::domain::user::{User, UserId};
use helpbot_core::notifications::{Notification, NotificationRouter};
use helpbot_db::repositories::user;
use helpbot_db::{in_transaction, DbPool, RepositoryError};

/// Keeps the `users` table in step with guild membership and announces
/// welcomes and new subscriptions.
#[derive(Clone)]
pub struct MemberDirectory {
    pool: DbPool,
    notifications: NotificationRouter,
    tiers: Vec<SubscriptionTier>,
}

impl MemberDirectory {
    pub fn new(pool: DbPool, notifications: NotificationRouter, tiers: Vec<SubscriptionTier>) -> Self {
        Self { pool, notifications, tiers }
    }

    pub async fn member_joined(
        &self,
        user_id: UserId,
        correlation_id: &str,
    ) -> Result<User, RepositoryError> {
        let member = user::ensure(&self.pool, user_id).await?;
        info!(
            event_name = "workflow.members.joined",
            correlation_id,
            user_id = %user_id,
            "member registered"
        );
        self.notifications.publish(Notification::MemberWelcomed { user_id }, correlation_id).await;
        Ok(member)
    }

    /// Drops the member's row; their tickets keep the raw id.
    pub async fn member_left(
        &self,
        user_id: UserId,
        correlation_id: &str,
    ) -> Result<bool, RepositoryError> {
        let removed = user::delete(&self.pool, user_id).await?;
        info!(
            event_name = "workflow.members.left",
            correlation_id,
            user_id = %user_id,
            removed,
            "member removed"
        );
        Ok(removed)
    }

    /// Registers every listed member that has no row yet. Returns how many were added.
    pub async fn sync_members(
        &self,
        members: Vec<UserId>,
        correlation_id: &str,
    ) -> Result<u64, RepositoryError> {
        let total = members.len();
        let created = in_transaction(&self.pool, move |conn| {
            Box::pin(async move { user::insert_missing(conn, &members).await })
        })
        .await?;

        info!(
            event_name = "workflow.members.synced",
            correlation_id,
            total,
            created,
            "guild members synchronized"
        );
        Ok(created)
    }

    /// Announces a subscription when an added role maps to a tier; removals are ignored.
    pub async fn roles_changed(
        &self,
        user_id: UserId,
        added: &[RoleId],
        correlation_id: &str,
    ) -> Option<u32> {
        let level = subscription_level(&self.tiers, added)?;
        info!(
            event_name = "workflow.members.subscribed",
            correlation_id,
            user_id = %user_id,
            subscription_level = level,
            "new subscriber"
        );
        self.notifications
            .publish(Notification::NewSubscriber { user_id, subscription_level: level }, correlation_id)
            .await;
        Some(level)
    }
}

#[cfg(test)]
mod tests {
    use helpbot_core::domain::member::{RoleId, SubscriptionTier};
    use helpbot_core::domain::user::UserId;
    use helpbot_core::notifications::{InMemoryNotificationSink, Notification, NotificationRouter};
    use helpbot_db::repositories::user;
    use helpbot_db::{connect_with_settings, migrations::run_pending, DbPool};

    use super::MemberDirectory;

    async fn directory() -> (MemberDirectory, DbPool, InMemoryNotificationSink) {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        let sink = InMemoryNotificationSink::default();
        let mut router = NotificationRouter::new();
        router.register(sink.clone());
        let tiers = vec![
            SubscriptionTier { role_id: RoleId(100), level: 1 },
            SubscriptionTier { role_id: RoleId(200), level: 2 },
        ];
        (MemberDirectory::new(pool.clone(), router, tiers), pool, sink)
    }

    #[tokio::test]
    async fn join_then_leave_round_trips_the_row() {
        let (directory, pool, sink) = directory().await;

        directory.member_joined(UserId(8), "evt-1").await.expect("join");
        assert!(user::find(&pool, UserId(8)).await.expect("find").is_some());
        assert_eq!(sink.notifications(), vec![Notification::MemberWelcomed { user_id: UserId(8) }]);

        assert!(directory.member_left(UserId(8), "evt-2").await.expect("leave"));
        assert!(user::find(&pool, UserId(8)).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn sync_only_adds_missing_members() {
        let (directory, pool, _sink) = directory().await;
        directory.member_joined(UserId(1), "evt-1").await.expect("join");

        let created = directory
            .sync_members(vec![UserId(1), UserId(2), UserId(3)], "evt-2")
            .await
            .expect("sync");

        assert_eq!(created, 2);
        assert_eq!(user::count(&pool).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn highest_added_tier_is_announced() {
        let (directory, _pool, sink) = directory().await;

        let level =
            directory.roles_changed(UserId(5), &[RoleId(100), RoleId(200), RoleId(7)], "evt").await;

        assert_eq!(level, Some(2));
        assert_eq!(
            sink.notifications(),
            vec![Notification::NewSubscriber { user_id: UserId(5), subscription_level: 2 }]
        );
    }

    #[tokio::test]
    async fn roles_without_a_tier_are_ignored() {
        let (directory, _pool, sink) = directory().await;

        assert_eq!(directory.roles_changed(UserId(5), &[RoleId(7)], "evt").await, None);
        assert!(sink.notifications().is_empty());
    }
}
