#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use helpbot_core::clock::{Clock, ManualClock};
use helpbot_core::domain::review::{MessageId, ReviewWindow, SignupForm};
use helpbot_core::notifications::{
    InMemoryNotificationSink, Notification, NotificationEnvelope, NotificationError,
    NotificationHandler, NotificationKind, NotificationRouter,
};
use helpbot_db::{connect_with_settings, migrations::run_pending, DbPool};
use helpbot_workflows::{ReviewLifecycle, SignupAnnouncer, TicketWorkflow};

pub async fn migrated_pool() -> DbPool {
    let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
    run_pending(&pool).await.expect("migrate");
    pool
}

/// File-backed pool with several connections, so transactions really overlap.
pub async fn shared_file_pool(dir: &tempfile::TempDir) -> DbPool {
    let url = format!("sqlite://{}", dir.path().join("helpbot.db").display());
    let pool = connect_with_settings(&url, 8, 10).await.expect("connect");
    run_pending(&pool).await.expect("migrate");
    pool
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single().expect("valid date")
}

pub fn router_with_sink() -> (NotificationRouter, InMemoryNotificationSink) {
    let sink = InMemoryNotificationSink::default();
    let mut router = NotificationRouter::new();
    router.register(sink.clone());
    (router, sink)
}

#[derive(Default)]
pub struct CountingAnnouncer {
    next_id: AtomicI64,
}

#[async_trait]
impl SignupAnnouncer for CountingAnnouncer {
    async fn announce_signup(&self, _window: &ReviewWindow) -> Result<MessageId, NotificationError> {
        Ok(MessageId(9000 + self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn retract_signup(&self, _message_id: MessageId) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Posts the signup, then closes the pool so storing the review fails.
pub struct PoolClosingAnnouncer {
    pub pool: DbPool,
    pub retracted: Mutex<Vec<MessageId>>,
}

#[async_trait]
impl SignupAnnouncer for PoolClosingAnnouncer {
    async fn announce_signup(&self, _window: &ReviewWindow) -> Result<MessageId, NotificationError> {
        self.pool.close().await;
        Ok(MessageId(4242))
    }

    async fn retract_signup(&self, message_id: MessageId) -> Result<(), NotificationError> {
        self.retracted.lock().expect("retracted lock").push(message_id);
        Ok(())
    }
}

/// Takes `delay` to deliver each close report.
pub struct SlowCloseHandler {
    pub delay: StdDuration,
    pub delivered: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl NotificationHandler for SlowCloseHandler {
    fn name(&self) -> &'static str {
        "slow_close"
    }

    fn accepts(&self, kind: NotificationKind) -> bool {
        kind == NotificationKind::CollectionClosed
    }

    async fn handle(&self, envelope: &NotificationEnvelope) -> Result<(), NotificationError> {
        tokio::time::sleep(self.delay).await;
        self.delivered.lock().expect("delivered lock").push(envelope.notification.clone());
        Ok(())
    }
}

pub struct UnreachableAnnouncer;

#[async_trait]
impl SignupAnnouncer for UnreachableAnnouncer {
    async fn announce_signup(&self, _window: &ReviewWindow) -> Result<MessageId, NotificationError> {
        Err(NotificationError::TargetUnavailable("announcements channel".to_owned()))
    }

    async fn retract_signup(&self, _message_id: MessageId) -> Result<(), NotificationError> {
        Ok(())
    }
}

pub fn lifecycle(
    pool: &DbPool,
    clock: Arc<dyn Clock>,
    router: NotificationRouter,
) -> ReviewLifecycle {
    ReviewLifecycle::new(
        pool.clone(),
        clock,
        router,
        Arc::new(CountingAnnouncer::default()),
        Duration::days(30),
    )
}

pub fn ticket_workflow(pool: &DbPool, clock: ManualClock, router: NotificationRouter) -> TicketWorkflow {
    TicketWorkflow::new(pool.clone(), Arc::new(clock), router, 5)
}

pub fn signup_form(repository: &str) -> SignupForm {
    SignupForm {
        repository_url: format!("https://github.com/members/{repository}"),
        description: "A moderation bot with slash commands, a ticket system and persistent \
                      storage; looking for feedback on the cog layout and error handling."
            .to_owned(),
        check_modules: Some("cogs/tickets.py, core/db.py".to_owned()),
        architecture_image_url: None,
    }
}

pub async fn entry_count(pool: &DbPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM review_entries")
        .fetch_one(pool)
        .await
        .expect("count entries")
}
