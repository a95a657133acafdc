//! Time-boxed code-review signup collection.
//!
//! Whether a collection is open is decided from persisted state: a review is
//! open while the clock is inside `[started_at, closed_at]` and its close
//! report has not gone out. The lifecycle keeps a cached pointer to the open
//! review and one deferred close task; both are rebuilt from the database by
//! [`ReviewLifecycle::recover`] after a restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use helpbot_core::clock::Clock;
use helpbot_core::domain::review::{
    MessageId, Review, ReviewId, ReviewWindow, SignupEntry, SignupForm,
};
use helpbot_core::domain::user::UserId;
use helpbot_core::notifications::{Notification, NotificationError, NotificationRouter};
use helpbot_db::repositories::review;
use helpbot_db::{in_transaction, DbPool};

use crate::errors::{ReviewError, ScheduledCloseError};

/// Posts the message carrying the signup control.
#[async_trait]
pub trait SignupAnnouncer: Send + Sync {
    async fn announce_signup(&self, window: &ReviewWindow) -> Result<MessageId, NotificationError>;

    /// Disables the signup control on a post whose review was never stored.
    async fn retract_signup(&self, message_id: MessageId) -> Result<(), NotificationError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The close report went out with these participants, in signup order.
    Closed { review_id: ReviewId, participants: Vec<UserId> },
    /// Nothing to do: already closed earlier, or the review no longer exists.
    AlreadyClosed { review_id: ReviewId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParticipantStatus {
    NoActiveCollection,
    AlreadySignedUp(SignupEntry),
    CanSignUp { review_id: ReviewId },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Elapsed while the process was down; closed during recovery.
    pub closed: Vec<ReviewId>,
    /// Still open; its close was scheduled for the remaining time.
    pub rearmed: Option<ReviewId>,
}

struct ScheduledClose {
    review_id: ReviewId,
    /// Cancels the wait only. A close that already started runs to completion.
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<Result<CloseOutcome, ReviewError>>,
}

struct Inner {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    notifications: NotificationRouter,
    announcer: Arc<dyn SignupAnnouncer>,
    max_duration: Duration,
    launching: Mutex<()>,
    active: Mutex<Option<Review>>,
    scheduled: Mutex<Option<ScheduledClose>>,
}

#[derive(Clone)]
pub struct ReviewLifecycle {
    inner: Arc<Inner>,
}

impl ReviewLifecycle {
    pub fn new(
        pool: DbPool,
        clock: Arc<dyn Clock>,
        notifications: NotificationRouter,
        announcer: Arc<dyn SignupAnnouncer>,
        max_duration: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                clock,
                notifications,
                announcer,
                max_duration,
                launching: Mutex::new(()),
                active: Mutex::new(None),
                scheduled: Mutex::new(None),
            }),
        }
    }

    pub async fn launch(&self, duration: Duration, correlation_id: &str) -> Result<Review, ReviewError> {
        // Held for the whole launch so two launches cannot both pass the check.
        let _launching = self.inner.launching.lock().await;

        self.close_elapsed(correlation_id).await?;

        if let Some(open) = self.open_review().await? {
            return Err(ReviewError::AlreadyActive { review_id: open.id });
        }

        let now = self.inner.clock.now();
        let window = ReviewWindow::starting_at(now, duration, self.inner.max_duration)
            .map_err(ReviewError::InvalidDuration)?;
        let message_id = self
            .inner
            .announcer
            .announce_signup(&window)
            .await
            .map_err(|error| ReviewError::Announcement(error.to_string()))?;
        let launched = match review::insert(&self.inner.pool, &window, message_id).await {
            Ok(launched) => launched,
            Err(insert_error) => {
                self.retract_orphaned_signup(message_id, correlation_id).await;
                return Err(insert_error.into());
            }
        };

        info!(
            event_name = "workflow.review.launched",
            correlation_id,
            review_id = %launched.id,
            closed_at = %launched.closed_at,
            "review signups opened"
        );

        *self.inner.active.lock().await = Some(launched.clone());
        self.schedule_close(&launched).await;
        Ok(launched)
    }

    pub async fn add_entry(
        &self,
        participant: UserId,
        form: SignupForm,
        correlation_id: &str,
    ) -> Result<(), ReviewError> {
        let form = form.validate().map_err(ReviewError::InvalidForm)?;
        let open = self.open_review().await?.ok_or(ReviewError::Inactive)?;
        let entry = SignupEntry { review_id: open.id, participant, form };
        let now = self.inner.clock.now();

        in_transaction(&self.inner.pool, move |conn| Box::pin(add_entry_in(conn, entry, now)))
            .await?;

        info!(
            event_name = "workflow.review.entry_added",
            correlation_id,
            review_id = %open.id,
            participant_id = %participant,
            "review signup added"
        );
        Ok(())
    }

    pub async fn remove_entry(
        &self,
        participant: UserId,
        correlation_id: &str,
    ) -> Result<RemoveOutcome, ReviewError> {
        let open = self.open_review().await?.ok_or(ReviewError::Inactive)?;

        let removed = review::delete_entry(&self.inner.pool, open.id, participant).await?;
        let outcome = if removed { RemoveOutcome::Removed } else { RemoveOutcome::NotPresent };

        info!(
            event_name = "workflow.review.entry_removed",
            correlation_id,
            review_id = %open.id,
            participant_id = %participant,
            removed,
            "review signup removal handled"
        );
        Ok(outcome)
    }

    pub async fn participant_status(
        &self,
        participant: UserId,
    ) -> Result<ParticipantStatus, ReviewError> {
        let Some(open) = self.open_review().await? else {
            return Ok(ParticipantStatus::NoActiveCollection);
        };

        match review::find_entry(&self.inner.pool, open.id, participant).await? {
            Some(entry) => Ok(ParticipantStatus::AlreadySignedUp(entry)),
            None => Ok(ParticipantStatus::CanSignUp { review_id: open.id }),
        }
    }

    /// Emits the close report for `review_id` once. Later calls, and calls
    /// for a review that no longer exists, are no-ops.
    pub async fn close_collection(
        &self,
        review_id: ReviewId,
        correlation_id: &str,
    ) -> Result<CloseOutcome, ReviewError> {
        let now = self.inner.clock.now();
        let closed = in_transaction(&self.inner.pool, move |conn| {
            Box::pin(finalize_in(conn, review_id, now))
        })
        .await?;

        let Some((closed_review, participants)) = closed else {
            info!(
                event_name = "workflow.review.close_skipped",
                correlation_id,
                review_id = %review_id,
                "review already closed"
            );
            return Ok(CloseOutcome::AlreadyClosed { review_id });
        };

        {
            let mut active = self.inner.active.lock().await;
            if active.as_ref().is_some_and(|review| review.id == review_id) {
                *active = None;
            }
        }

        info!(
            event_name = "workflow.review.closed",
            correlation_id,
            review_id = %review_id,
            participant_count = participants.len(),
            "review signups closed"
        );

        self.inner
            .notifications
            .publish(
                Notification::CollectionClosed {
                    review_id,
                    announcement_message_id: closed_review.announcement_message_id,
                    participants: participants.clone(),
                },
                correlation_id,
            )
            .await;

        Ok(CloseOutcome::Closed { review_id, participants })
    }

    /// Rebuilds the open-review pointer and close timer from the database.
    pub async fn recover(&self, correlation_id: &str) -> Result<RecoveryReport, ReviewError> {
        let mut report = RecoveryReport::default();
        let now = self.inner.clock.now();

        for pending in review::list_unfinalized(&self.inner.pool).await? {
            if pending.closed_at < now {
                warn!(
                    event_name = "workflow.review.recovered_elapsed",
                    correlation_id,
                    review_id = %pending.id,
                    closed_at = %pending.closed_at,
                    "review window elapsed while offline; closing now"
                );
                self.close_collection(pending.id, correlation_id).await?;
                report.closed.push(pending.id);
            } else if pending.started_at <= now {
                *self.inner.active.lock().await = Some(pending.clone());
                self.schedule_close(&pending).await;
                report.rearmed = Some(pending.id);
            }
        }

        info!(
            event_name = "workflow.review.recovered",
            correlation_id,
            closed = report.closed.len(),
            rearmed = report.rearmed.map(|id| id.0),
            "review state recovered"
        );
        Ok(report)
    }

    /// The open review, if any. Reads through the cached pointer.
    pub async fn current(&self) -> Result<Option<Review>, ReviewError> {
        self.open_review().await
    }

    pub async fn scheduled_review_id(&self) -> Option<ReviewId> {
        self.inner.scheduled.lock().await.as_ref().map(|scheduled| scheduled.review_id)
    }

    /// Waits for the pending close task, if one is scheduled, and reports how it ended.
    pub async fn join_scheduled_close(&self) -> Option<Result<CloseOutcome, ScheduledCloseError>> {
        let ScheduledClose { cancel: _keep_armed, handle, .. } =
            self.inner.scheduled.lock().await.take()?;
        Some(match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(error)) => Err(ScheduledCloseError::Close(error)),
            Err(error) => Err(ScheduledCloseError::Join(error)),
        })
    }

    async fn open_review(&self) -> Result<Option<Review>, ReviewError> {
        let now = self.inner.clock.now();
        let mut active = self.inner.active.lock().await;

        if let Some(cached) = active.as_ref().filter(|review| review.is_open_at(now)) {
            return Ok(Some(cached.clone()));
        }

        let open = review::find_open_at(&self.inner.pool, now).await?;
        active.clone_from(&open);
        Ok(open)
    }

    async fn close_elapsed(&self, correlation_id: &str) -> Result<(), ReviewError> {
        let now = self.inner.clock.now();
        for pending in review::list_unfinalized(&self.inner.pool).await? {
            if pending.closed_at < now {
                self.close_collection(pending.id, correlation_id).await?;
            }
        }
        Ok(())
    }

    async fn schedule_close(&self, target: &Review) {
        let mut scheduled = self.inner.scheduled.lock().await;
        if let Some(stale) = scheduled.take() {
            // The receiver is gone once the stale task left its wait; that close
            // keeps running detached and still delivers its report.
            let waiting = stale.cancel.send(()).is_ok();
            info!(
                event_name = "workflow.review.close_cancelled",
                review_id = %stale.review_id,
                waiting,
                "stale scheduled close superseded"
            );
        }

        let delay = target.remaining_at(self.inner.clock.now());
        let review_id = target.id;
        let lifecycle = self.clone();
        let (cancel, cancelled) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled => return Ok(CloseOutcome::AlreadyClosed { review_id }),
            }
            let correlation_id = Uuid::new_v4().to_string();
            let result = lifecycle.close_collection(review_id, &correlation_id).await;
            if let Err(error) = &result {
                error!(
                    event_name = "workflow.review.scheduled_close_failed",
                    correlation_id = %correlation_id,
                    review_id = %review_id,
                    error = %error,
                    error_detail = ?error,
                    "scheduled review close failed"
                );
            }
            result
        });

        info!(
            event_name = "workflow.review.close_scheduled",
            review_id = %review_id,
            delay_secs = delay.as_secs(),
            "review close scheduled"
        );
        *scheduled = Some(ScheduledClose { review_id, cancel, handle });
    }

    async fn retract_orphaned_signup(&self, message_id: MessageId, correlation_id: &str) {
        if let Err(error) = self.inner.announcer.retract_signup(message_id).await {
            warn!(
                event_name = "workflow.review.orphaned_signup",
                correlation_id,
                message_id = message_id.0,
                error = %error,
                "signup post left without a review; controls could not be removed"
            );
            return;
        }
        info!(
            event_name = "workflow.review.signup_retracted",
            correlation_id,
            message_id = message_id.0,
            "signup post retracted after failed review insert"
        );
    }
}

async fn add_entry_in(
    conn: &mut SqliteConnection,
    entry: SignupEntry,
    now: DateTime<Utc>,
) -> Result<(), ReviewError> {
    let participant = entry.participant;
    review::insert_entry(&mut *conn, &entry, now).await.map_err(|error| {
        if error.is_unique_violation() {
            ReviewError::AlreadyPresent { participant }
        } else {
            ReviewError::Repository(error)
        }
    })?;

    // The insert holds the write lock; a close that committed first is visible here.
    let still_open = review::find(&mut *conn, entry.review_id)
        .await?
        .is_some_and(|review| review.is_open_at(now));
    if !still_open {
        return Err(ReviewError::Inactive);
    }
    Ok(())
}

async fn finalize_in(
    conn: &mut SqliteConnection,
    review_id: ReviewId,
    now: DateTime<Utc>,
) -> Result<Option<(Review, Vec<UserId>)>, ReviewError> {
    if !review::mark_finalized(&mut *conn, review_id, now).await? {
        return Ok(None);
    }
    let Some(closed) = review::find(&mut *conn, review_id).await? else {
        return Ok(None);
    };
    let participants = review::list_participants(&mut *conn, review_id).await?;
    Ok(Some((closed, participants)))
}
