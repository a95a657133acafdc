//! Turns outbound notifications into platform messages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use helpbot_core::config::AppConfig;
use helpbot_core::domain::review::{MessageId, ReviewWindow};
use helpbot_core::domain::user::UserId;
use helpbot_core::notifications::{
    Notification, NotificationEnvelope, NotificationError, NotificationHandler, NotificationKind,
};
use helpbot_workflows::SignupAnnouncer;

use crate::events::ChannelId;
use crate::messages;
use crate::platform::{MessageSender, MessageTarget, PlatformError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotifierChannels {
    /// Review signup posts and close reports.
    pub announcements: ChannelId,
    /// Level-ups, welcomes and subscriber thanks.
    pub bot_messages: ChannelId,
    pub help_forum: ChannelId,
    pub owner: UserId,
}

impl NotifierChannels {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            announcements: ChannelId(config.discord.announcements_channel_id),
            bot_messages: ChannelId(config.discord.bot_messages_channel_id),
            help_forum: ChannelId(config.discord.help_forum_id),
            owner: UserId(config.discord.owner_id),
        }
    }
}

#[derive(Clone)]
pub struct PlatformNotifier {
    sender: Arc<dyn MessageSender>,
    channels: NotifierChannels,
}

impl PlatformNotifier {
    pub fn new(sender: Arc<dyn MessageSender>, channels: NotifierChannels) -> Self {
        Self { sender, channels }
    }

    async fn deliver(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<(), PlatformError> {
        match &envelope.notification {
            Notification::UserLeveledUp { user_id, new_level } => {
                self.sender
                    .send(
                        MessageTarget::Channel(self.channels.bot_messages),
                        &messages::level_up_message(*user_id, *new_level),
                    )
                    .await?;
            }
            Notification::NewSubscriber { user_id, subscription_level } => {
                self.sender
                    .send(
                        MessageTarget::Channel(self.channels.bot_messages),
                        &messages::subscriber_thanks_message(
                            *user_id,
                            *subscription_level,
                            self.channels.help_forum,
                        ),
                    )
                    .await?;
                // The owner notice is best effort once the public thanks went out.
                if let Err(error) = self
                    .sender
                    .send(
                        MessageTarget::Direct(self.channels.owner),
                        &messages::subscriber_owner_notice(*user_id, *subscription_level),
                    )
                    .await
                {
                    warn!(
                        correlation_id = %envelope.correlation_id,
                        user_id = %user_id,
                        error = %error,
                        "could not notify the owner about a new subscriber"
                    );
                }
            }
            Notification::CollectionClosed { announcement_message_id, participants, .. } => {
                let announcements = self.channels.announcements;
                self.sender.clear_components(announcements, *announcement_message_id).await?;
                self.sender
                    .send(
                        MessageTarget::Reply {
                            channel: announcements,
                            message: *announcement_message_id,
                        },
                        &messages::collection_closed_message(participants),
                    )
                    .await?;
            }
            Notification::MemberWelcomed { user_id } => {
                self.sender
                    .send(
                        MessageTarget::Channel(self.channels.bot_messages),
                        &messages::welcome_message(*user_id),
                    )
                    .await?;
            }
            // Answered inline by the mark-solution response.
            Notification::TicketResolved { .. } => {}
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for PlatformNotifier {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn accepts(&self, kind: NotificationKind) -> bool {
        kind != NotificationKind::TicketResolved
    }

    async fn handle(&self, envelope: &NotificationEnvelope) -> Result<(), NotificationError> {
        self.deliver(envelope).await.map_err(|error| match error {
            PlatformError::NotFound(target) => NotificationError::TargetUnavailable(target),
            PlatformError::Request(message) => NotificationError::Delivery(message),
        })
    }
}

#[async_trait]
impl SignupAnnouncer for PlatformNotifier {
    async fn announce_signup(&self, window: &ReviewWindow) -> Result<MessageId, NotificationError> {
        let message_id = self
            .sender
            .send(
                MessageTarget::Channel(self.channels.announcements),
                &messages::signup_announcement_message(window),
            )
            .await
            .map_err(|error| NotificationError::Delivery(error.to_string()))?;

        info!(
            event_name = "egress.gateway.signup_announced",
            channel_id = %self.channels.announcements,
            message_id = message_id.0,
            closes_at = %window.closed_at,
            "review signup announcement posted"
        );
        Ok(message_id)
    }

    async fn retract_signup(&self, message_id: MessageId) -> Result<(), NotificationError> {
        self.sender
            .clear_components(self.channels.announcements, message_id)
            .await
            .map_err(|error| NotificationError::Delivery(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use helpbot_core::domain::review::{MessageId, ReviewId, ReviewWindow};
    use helpbot_core::domain::ticket::{ThreadId, TicketId};
    use helpbot_core::domain::user::UserId;
    use helpbot_core::notifications::{Notification, NotificationError, NotificationRouter};
    use helpbot_workflows::SignupAnnouncer;

    use super::{NotifierChannels, PlatformNotifier};
    use crate::events::ChannelId;
    use crate::messages::SIGNUP_ADD_BUTTON;
    use crate::platform::{MessageTarget, RecordingMessageSender};

    fn channels() -> NotifierChannels {
        NotifierChannels {
            announcements: ChannelId(1002),
            bot_messages: ChannelId(1003),
            help_forum: ChannelId(1001),
            owner: UserId(1),
        }
    }

    fn routed(sender: &RecordingMessageSender) -> NotificationRouter {
        let mut router = NotificationRouter::new();
        router.register(PlatformNotifier::new(Arc::new(sender.clone()), channels()));
        router
    }

    #[tokio::test]
    async fn close_report_replies_under_the_signup_post_and_removes_buttons() {
        let sender = RecordingMessageSender::default();
        let report = routed(&sender)
            .publish(
                Notification::CollectionClosed {
                    review_id: ReviewId(3),
                    announcement_message_id: MessageId(77),
                    participants: vec![UserId(5), UserId(6)],
                },
                "evt-1",
            )
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(sender.cleared(), vec![(ChannelId(1002), MessageId(77))]);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].target,
            MessageTarget::Reply { channel: ChannelId(1002), message: MessageId(77) }
        );
    }

    #[tokio::test]
    async fn new_subscriber_thanks_publicly_and_tells_the_owner() {
        let sender = RecordingMessageSender::default();
        routed(&sender)
            .publish(Notification::NewSubscriber { user_id: UserId(9), subscription_level: 2 }, "evt-2")
            .await;

        let targets: Vec<_> = sender.sent().into_iter().map(|sent| sent.target).collect();
        assert_eq!(
            targets,
            vec![MessageTarget::Channel(ChannelId(1003)), MessageTarget::Direct(UserId(1))]
        );
    }

    #[tokio::test]
    async fn ticket_resolution_is_not_reposted() {
        let sender = RecordingMessageSender::default();
        let report = routed(&sender)
            .publish(
                Notification::TicketResolved {
                    ticket_id: TicketId(1),
                    thread_id: ThreadId(2),
                    resolver_id: UserId(3),
                    self_resolved: false,
                },
                "evt-3",
            )
            .await;

        assert_eq!(report.delivered, 0);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_to_the_router() {
        let sender = RecordingMessageSender::failing();
        let report = routed(&sender)
            .publish(Notification::UserLeveledUp { user_id: UserId(4), new_level: 2 }, "evt-4")
            .await;

        assert_eq!(report.delivered, 0);
        assert!(matches!(report.failed[0].1, NotificationError::Delivery(_)));
    }

    #[tokio::test]
    async fn signup_announcement_returns_the_posted_message_id() {
        let sender = RecordingMessageSender::default();
        let notifier = PlatformNotifier::new(Arc::new(sender.clone()), channels());
        let started_at = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let window = ReviewWindow { started_at, closed_at: started_at + Duration::days(2) };

        let message_id = notifier.announce_signup(&window).await.expect("announce");

        assert_eq!(message_id, MessageId(1));
        let sent = sender.sent();
        assert_eq!(sent[0].target, MessageTarget::Channel(ChannelId(1002)));
        assert!(sent[0].message.button(SIGNUP_ADD_BUTTON).is_some());
    }

    #[tokio::test]
    async fn retracted_signup_loses_its_buttons() {
        let sender = RecordingMessageSender::default();
        let notifier = PlatformNotifier::new(Arc::new(sender.clone()), channels());

        notifier.retract_signup(MessageId(31)).await.expect("retract");

        assert_eq!(sender.cleared(), vec![(ChannelId(1002), MessageId(31))]);
        assert!(sender.sent().is_empty());
    }
}
