//! Outbound notifications.
//!
//! Components never talk to the chat platform directly. They publish a typed
//! [`Notification`] on a [`NotificationRouter`], which hands it to every
//! registered [`NotificationHandler`] that accepts its kind. Delivery is
//! fire-and-forget: a failing handler is logged and does not affect the
//! publisher or the other handlers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::review::{MessageId, ReviewId};
use crate::domain::ticket::{ThreadId, TicketId};
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    UserLeveledUp {
        user_id: UserId,
        new_level: u32,
    },
    NewSubscriber {
        user_id: UserId,
        subscription_level: u32,
    },
    /// An empty `participants` list means nobody signed up.
    CollectionClosed {
        review_id: ReviewId,
        announcement_message_id: MessageId,
        participants: Vec<UserId>,
    },
    TicketResolved {
        ticket_id: TicketId,
        thread_id: ThreadId,
        resolver_id: UserId,
        self_resolved: bool,
    },
    MemberWelcomed {
        user_id: UserId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    UserLeveledUp,
    NewSubscriber,
    CollectionClosed,
    TicketResolved,
    MemberWelcomed,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        Self::UserLeveledUp,
        Self::NewSubscriber,
        Self::CollectionClosed,
        Self::TicketResolved,
        Self::MemberWelcomed,
    ];

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::UserLeveledUp => "notification.user_leveled_up",
            Self::NewSubscriber => "notification.new_subscriber",
            Self::CollectionClosed => "notification.collection_closed",
            Self::TicketResolved => "notification.ticket_resolved",
            Self::MemberWelcomed => "notification.member_welcomed",
        }
    }
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::UserLeveledUp { .. } => NotificationKind::UserLeveledUp,
            Self::NewSubscriber { .. } => NotificationKind::NewSubscriber,
            Self::CollectionClosed { .. } => NotificationKind::CollectionClosed,
            Self::TicketResolved { .. } => NotificationKind::TicketResolved,
            Self::MemberWelcomed { .. } => NotificationKind::MemberWelcomed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub notification_id: String,
    pub correlation_id: String,
    pub notification: Notification,
    pub emitted_at: DateTime<Utc>,
}

impl NotificationEnvelope {
    pub fn new(notification: Notification, correlation_id: impl Into<String>) -> Self {
        Self {
            notification_id: Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            notification,
            emitted_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("notification target unavailable: {0}")]
    TargetUnavailable(String),
}

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, kind: NotificationKind) -> bool;

    async fn handle(&self, envelope: &NotificationEnvelope) -> Result<(), NotificationError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<(String, NotificationError)>,
}

#[derive(Clone, Default)]
pub struct NotificationRouter {
    handlers: Vec<Arc<dyn NotificationHandler>>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: NotificationHandler + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn register_shared(&mut self, handler: Arc<dyn NotificationHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub async fn publish(
        &self,
        notification: Notification,
        correlation_id: impl Into<String>,
    ) -> DeliveryReport {
        let envelope = NotificationEnvelope::new(notification, correlation_id);
        let kind = envelope.notification.kind();
        let mut report = DeliveryReport::default();

        for handler in self.handlers.iter().filter(|handler| handler.accepts(kind)) {
            match handler.handle(&envelope).await {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(
                        event_name = kind.event_name(),
                        notification_id = %envelope.notification_id,
                        correlation_id = %envelope.correlation_id,
                        handler = handler.name(),
                        "notification delivered"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = kind.event_name(),
                        notification_id = %envelope.notification_id,
                        correlation_id = %envelope.correlation_id,
                        handler = handler.name(),
                        error = %error,
                        "notification handler failed; continuing"
                    );
                    report.failed.push((handler.name().to_owned(), error));
                }
            }
        }

        report
    }
}

/// Records every notification it receives.
#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    envelopes: Arc<Mutex<Vec<NotificationEnvelope>>>,
}

impl InMemoryNotificationSink {
    pub fn envelopes(&self) -> Vec<NotificationEnvelope> {
        match self.envelopes.lock() {
            Ok(envelopes) => envelopes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.envelopes().into_iter().map(|envelope| envelope.notification).collect()
    }
}

#[async_trait]
impl NotificationHandler for InMemoryNotificationSink {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn accepts(&self, _kind: NotificationKind) -> bool {
        true
    }

    async fn handle(&self, envelope: &NotificationEnvelope) -> Result<(), NotificationError> {
        match self.envelopes.lock() {
            Ok(mut envelopes) => envelopes.push(envelope.clone()),
            Err(poisoned) => poisoned.into_inner().push(envelope.clone()),
        }
        Ok(())
    }
}
