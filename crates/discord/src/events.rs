use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use helpbot_core::config::AppConfig;
use helpbot_core::domain::member::RoleId;
use helpbot_core::domain::review::{MessageId, SignupForm};
use helpbot_core::domain::ticket::ThreadId;
use helpbot_core::domain::user::UserId;
use helpbot_core::errors::{ApplicationError, InterfaceError};
use helpbot_db::RepositoryError;
use helpbot_workflows::{
    LedgerError, MemberDirectory, ParticipantStatus, RemoveOutcome, ReputationLedger,
    ReviewError, ReviewLifecycle, TicketError, TicketWorkflow,
};

use crate::messages::{self, MessageTemplate};
use crate::platform::{ForumGateway, PlatformError};

/// Name of the message command members use to accept an answer.
pub const MARK_SOLUTION_COMMAND: &str = "Mark as solution ✅";
pub const SOLUTION_REACTION: &str = "✅";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayEvent {
    ThreadCreated(ThreadCreatedEvent),
    MemberJoined(MemberEvent),
    MemberLeft(MemberEvent),
    RolesChanged(RolesChangedEvent),
    MarkSolution(MarkSolutionEvent),
    SignupRequested(SignupInteraction),
    SignupSubmitted(SignupSubmission),
    SignupRemoved(SignupInteraction),
    Command(CommandInvocation),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::ThreadCreated(_) => GatewayEventType::ThreadCreated,
            Self::MemberJoined(_) => GatewayEventType::MemberJoined,
            Self::MemberLeft(_) => GatewayEventType::MemberLeft,
            Self::RolesChanged(_) => GatewayEventType::RolesChanged,
            Self::MarkSolution(_) => GatewayEventType::MarkSolution,
            Self::SignupRequested(_) => GatewayEventType::SignupRequested,
            Self::SignupSubmitted(_) => GatewayEventType::SignupSubmitted,
            Self::SignupRemoved(_) => GatewayEventType::SignupRemoved,
            Self::Command(_) => GatewayEventType::Command,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    ThreadCreated,
    MemberJoined,
    MemberLeft,
    RolesChanged,
    MarkSolution,
    SignupRequested,
    SignupSubmitted,
    SignupRemoved,
    Command,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCreatedEvent {
    pub thread_id: ThreadId,
    pub owner_id: UserId,
    pub parent_id: ChannelId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEvent {
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolesChangedEvent {
    pub user_id: UserId,
    pub added_roles: Vec<RoleId>,
    pub removed_roles: Vec<RoleId>,
}

/// "Mark as solution" invoked on a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSolutionEvent {
    pub channel_id: ChannelId,
    /// Parent of the channel when it is a thread.
    pub parent_id: Option<ChannelId>,
    pub thread_owner_id: Option<UserId>,
    pub message_id: MessageId,
    pub message_author_id: UserId,
    pub author_is_bot: bool,
    pub invoker_id: UserId,
    pub jump_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupInteraction {
    pub participant_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupSubmission {
    pub participant_id: UserId,
    pub form: SignupForm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub invoker_id: UserId,
    #[serde(default)]
    pub invoker_roles: Vec<RoleId>,
    pub channel_id: ChannelId,
    pub parent_id: Option<ChannelId>,
    pub command: BotCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum BotCommand {
    /// Owner only. Falls back to the configured default duration.
    LaunchReview { days: Option<u32> },
    ReputationShow { user_id: Option<UserId> },
    /// Owner only.
    ReputationSet { user_id: UserId, amount: i64 },
    TicketRename { new_name: String },
    TicketArchive,
    TicketUnarchive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

/// Guild-specific ids the handlers check against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuildSettings {
    pub help_forum_id: ChannelId,
    pub owner_id: UserId,
    pub helper_role_id: RoleId,
    pub default_review_days: u32,
}

impl GuildSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            help_forum_id: ChannelId(config.discord.help_forum_id),
            owner_id: UserId(config.discord.owner_id),
            helper_role_id: RoleId(config.discord.helper_role_id),
            default_review_days: config.review.default_duration_days,
        }
    }

    fn require_owner(&self, invoker: UserId) -> Result<(), Rejection> {
        if invoker == self.owner_id {
            Ok(())
        } else {
            Err(Rejection::MissingPermissions)
        }
    }

    fn require_moderator(&self, invoker: UserId, roles: &[RoleId]) -> Result<(), Rejection> {
        if invoker == self.owner_id || roles.contains(&self.helper_role_id) {
            Ok(())
        } else {
            Err(Rejection::MissingPermissions)
        }
    }

    fn require_help_forum(&self, parent: Option<ChannelId>) -> Result<(), Rejection> {
        if parent == Some(self.help_forum_id) {
            Ok(())
        } else {
            Err(Rejection::NotInHelpForum { help_forum: self.help_forum_id })
        }
    }
}

/// Platform-side preconditions checked before any workflow runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("This command can only be used in <#{help_forum}>")]
    NotInHelpForum { help_forum: ChannelId },
    #[error("Only the author of the question can mark a solution")]
    NotThreadOwner,
    #[error("A bot's message cannot be marked as the solution")]
    BotAnswer,
    #[error("You do not have enough permissions to run this command")]
    MissingPermissions,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl EventHandlerError {
    pub fn into_interface(self, correlation_id: &str) -> InterfaceError {
        match self {
            Self::Rejected(rejection) => InterfaceError::Rejected {
                message: rejection.to_string(),
                correlation_id: correlation_id.to_owned(),
            },
            Self::Application(error) => error.into_interface(correlation_id),
            Self::Platform(error) => {
                ApplicationError::Integration(error.to_string()).into_interface(correlation_id)
            }
        }
    }
}

impl From<TicketError> for EventHandlerError {
    fn from(value: TicketError) -> Self {
        Self::Application(value.into())
    }
}

impl From<ReviewError> for EventHandlerError {
    fn from(value: ReviewError) -> Self {
        Self::Application(value.into())
    }
}

impl From<LedgerError> for EventHandlerError {
    fn from(value: LedgerError) -> Self {
        Self::Application(value.into())
    }
}

impl From<RepositoryError> for EventHandlerError {
    fn from(value: RepositoryError) -> Self {
        Self::Application(ApplicationError::Persistence(value.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Infrastructure failure; the member only sees a generic message.
    #[error(transparent)]
    Handler(#[from] InterfaceError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    /// Runs the handler for the envelope's event type. Rejections become a
    /// reply to the member; anything else is returned for the caller to log.
    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let event_type = envelope.event.event_type();
        let Some(handler) = self.handlers.get(&event_type) else {
            return Ok(HandlerResult::Ignored);
        };

        match handler.handle(envelope, ctx).await {
            Ok(result) => Ok(result),
            Err(error) => {
                let interface = error.into_interface(&ctx.correlation_id);
                if let InterfaceError::Rejected { message, .. } = &interface {
                    info!(
                        event_name = "ingress.gateway.rejected",
                        correlation_id = %ctx.correlation_id,
                        event_type = ?event_type,
                        reason = %message,
                        "event rejected"
                    );
                    return Ok(HandlerResult::Responded(messages::interface_error_message(
                        &interface,
                    )));
                }
                Err(DispatchError::Handler(interface))
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Everything the handlers act on.
#[derive(Clone)]
pub struct BotComponents {
    pub settings: GuildSettings,
    pub tickets: TicketWorkflow,
    pub members: MemberDirectory,
    pub ledger: ReputationLedger,
    pub reviews: ReviewLifecycle,
    pub forum: Arc<dyn ForumGateway>,
}

pub fn default_dispatcher(components: BotComponents) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(ThreadCreatedHandler {
        settings: components.settings,
        tickets: components.tickets.clone(),
    });
    dispatcher.register(MemberJoinedHandler { members: components.members.clone() });
    dispatcher.register(MemberLeftHandler { members: components.members.clone() });
    dispatcher.register(RolesChangedHandler { members: components.members });
    dispatcher.register(MarkSolutionHandler {
        settings: components.settings,
        tickets: components.tickets,
        forum: components.forum.clone(),
    });
    dispatcher.register(SignupRequestedHandler { reviews: components.reviews.clone() });
    dispatcher.register(SignupSubmittedHandler { reviews: components.reviews.clone() });
    dispatcher.register(SignupRemovedHandler { reviews: components.reviews.clone() });
    dispatcher.register(CommandHandler {
        settings: components.settings,
        ledger: components.ledger,
        reviews: components.reviews,
        forum: components.forum,
    });
    dispatcher
}

pub struct ThreadCreatedHandler {
    settings: GuildSettings,
    tickets: TicketWorkflow,
}

#[async_trait]
impl EventHandler for ThreadCreatedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ThreadCreated
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ThreadCreated(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.parent_id != self.settings.help_forum_id {
            return Ok(HandlerResult::Ignored);
        }

        match self.tickets.open_ticket(event.thread_id, event.owner_id, &ctx.correlation_id).await
        {
            Ok(_) => Ok(HandlerResult::Responded(messages::post_created_message(
                MARK_SOLUTION_COMMAND,
            ))),
            // Redelivered event; the ticket and its greeting already exist.
            Err(TicketError::AlreadyExists { thread_id }) => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    thread_id = %thread_id,
                    "thread already has a ticket"
                );
                Ok(HandlerResult::Processed)
            }
            Err(error) => Err(error.into()),
        }
    }
}

pub struct MemberJoinedHandler {
    members: MemberDirectory,
}

#[async_trait]
impl EventHandler for MemberJoinedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MemberJoined
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::MemberJoined(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.members.member_joined(event.user_id, &ctx.correlation_id).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct MemberLeftHandler {
    members: MemberDirectory,
}

#[async_trait]
impl EventHandler for MemberLeftHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MemberLeft
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::MemberLeft(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.members.member_left(event.user_id, &ctx.correlation_id).await?;
        Ok(HandlerResult::Processed)
    }
}

pub struct RolesChangedHandler {
    members: MemberDirectory,
}

#[async_trait]
impl EventHandler for RolesChangedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::RolesChanged
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::RolesChanged(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.added_roles.is_empty() {
            return Ok(HandlerResult::Ignored);
        }
        self.members.roles_changed(event.user_id, &event.added_roles, &ctx.correlation_id).await;
        Ok(HandlerResult::Processed)
    }
}

pub struct MarkSolutionHandler {
    settings: GuildSettings,
    tickets: TicketWorkflow,
    forum: Arc<dyn ForumGateway>,
}

#[async_trait]
impl EventHandler for MarkSolutionHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::MarkSolution
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::MarkSolution(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.settings.require_help_forum(event.parent_id)?;
        if event.thread_owner_id != Some(event.invoker_id) {
            return Err(Rejection::NotThreadOwner.into());
        }
        if event.author_is_bot {
            return Err(Rejection::BotAnswer.into());
        }

        let thread_id = ThreadId(event.channel_id.0);
        let resolution = self
            .tickets
            .resolve_ticket(thread_id, event.message_author_id, &ctx.correlation_id)
            .await?;

        if let Err(error) =
            self.forum.add_reaction(thread_id, event.message_id, SOLUTION_REACTION).await
        {
            warn!(
                correlation_id = %ctx.correlation_id,
                thread_id = %thread_id,
                error = %error,
                "could not react to the accepted answer"
            );
        }

        Ok(HandlerResult::Responded(messages::solution_marked_message(
            event.message_author_id,
            resolution.is_self_resolved(),
            &event.jump_url,
            resolution.reputation.as_ref(),
        )))
    }
}

pub struct SignupRequestedHandler {
    reviews: ReviewLifecycle,
}

#[async_trait]
impl EventHandler for SignupRequestedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SignupRequested
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SignupRequested(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = match self.reviews.participant_status(event.participant_id).await? {
            ParticipantStatus::NoActiveCollection => messages::signups_closed_message(),
            ParticipantStatus::AlreadySignedUp(_) => messages::signup_already_present_message(),
            ParticipantStatus::CanSignUp { .. } => messages::signup_form(),
        };
        Ok(HandlerResult::Responded(message))
    }
}

pub struct SignupSubmittedHandler {
    reviews: ReviewLifecycle,
}

#[async_trait]
impl EventHandler for SignupSubmittedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SignupSubmitted
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SignupSubmitted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let added = self
            .reviews
            .add_entry(event.participant_id, event.form.clone(), &ctx.correlation_id)
            .await;
        let message = match added {
            Ok(()) => messages::signup_confirmed_message(),
            Err(ReviewError::Inactive) => messages::signups_closed_message(),
            Err(ReviewError::AlreadyPresent { .. }) => messages::signup_already_present_message(),
            Err(error) => return Err(error.into()),
        };
        Ok(HandlerResult::Responded(message))
    }
}

pub struct SignupRemovedHandler {
    reviews: ReviewLifecycle,
}

#[async_trait]
impl EventHandler for SignupRemovedHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SignupRemoved
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SignupRemoved(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message =
            match self.reviews.remove_entry(event.participant_id, &ctx.correlation_id).await {
                Ok(RemoveOutcome::Removed) => messages::signup_cancelled_message(),
                Ok(RemoveOutcome::NotPresent) => messages::signup_not_present_message(),
                Err(ReviewError::Inactive) => messages::signups_closed_message(),
                Err(error) => return Err(error.into()),
            };
        Ok(HandlerResult::Responded(message))
    }
}

pub struct CommandHandler {
    settings: GuildSettings,
    ledger: ReputationLedger,
    reviews: ReviewLifecycle,
    forum: Arc<dyn ForumGateway>,
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Command
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::Command(invocation) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let invoker = invocation.invoker_id;
        let correlation_id = ctx.correlation_id.as_str();

        let message = match &invocation.command {
            BotCommand::LaunchReview { days } => {
                self.settings.require_owner(invoker)?;
                let days = days.unwrap_or(self.settings.default_review_days);
                let review =
                    self.reviews.launch(Duration::days(i64::from(days)), correlation_id).await?;
                messages::review_launched_message(&review)
            }
            BotCommand::ReputationShow { user_id } => {
                let standing = self.ledger.standing(user_id.unwrap_or(invoker)).await?;
                messages::reputation_message(&standing)
            }
            BotCommand::ReputationSet { user_id, amount } => {
                self.settings.require_owner(invoker)?;
                let change = self.ledger.set_absolute(*user_id, *amount, correlation_id).await?;
                messages::reputation_set_message(*user_id, &change)
            }
            BotCommand::TicketRename { new_name } => {
                let thread = self.moderated_thread(invocation)?;
                self.forum.rename_thread(thread, new_name).await?;
                messages::ticket_renamed_message(invoker)
            }
            BotCommand::TicketArchive => {
                let thread = self.moderated_thread(invocation)?;
                self.forum.archive_thread(thread).await?;
                messages::ticket_archived_message()
            }
            BotCommand::TicketUnarchive => {
                let thread = self.moderated_thread(invocation)?;
                self.forum.unarchive_thread(thread).await?;
                messages::ticket_unarchived_message()
            }
        };
        Ok(HandlerResult::Responded(message))
    }
}

impl CommandHandler {
    fn moderated_thread(&self, invocation: &CommandInvocation) -> Result<ThreadId, Rejection> {
        self.settings.require_help_forum(invocation.parent_id)?;
        self.settings.require_moderator(invocation.invoker_id, &invocation.invoker_roles)?;
        Ok(ThreadId(invocation.channel_id.0))
    }
}

#[cfg(test)]
mod tests {
    use helpbot_core::domain::review::MessageId;
    use helpbot_core::domain::ticket::ThreadId;
    use helpbot_core::domain::user::UserId;

    use super::{
        ChannelId, EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent,
        GatewayEventType, HandlerResult, MarkSolutionEvent, Rejection, ThreadCreatedEvent,
    };
    use crate::platform::PlatformError;

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = GatewayEnvelope {
            envelope_id: "env-1".to_owned(),
            event: GatewayEvent::ThreadCreated(ThreadCreatedEvent {
                thread_id: ThreadId(10),
                owner_id: UserId(1),
                parent_id: ChannelId(1001),
            }),
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[test]
    fn envelopes_decode_from_tagged_json() {
        let raw = r#"{
            "envelope_id": "env-2",
            "event": {
                "type": "mark_solution",
                "payload": {
                    "channel_id": 55,
                    "parent_id": 1001,
                    "thread_owner_id": 7,
                    "message_id": 900,
                    "message_author_id": 8,
                    "author_is_bot": false,
                    "invoker_id": 7,
                    "jump_url": "https://discord.com/channels/1/55/900"
                }
            }
        }"#;

        let envelope: GatewayEnvelope = serde_json::from_str(raw).expect("decode");
        assert_eq!(envelope.event.event_type(), GatewayEventType::MarkSolution);
        assert!(matches!(
            envelope.event,
            GatewayEvent::MarkSolution(MarkSolutionEvent { message_id: MessageId(900), .. })
        ));
    }

    #[test]
    fn rejections_reach_members_verbatim() {
        let interface = super::EventHandlerError::from(Rejection::NotInHelpForum {
            help_forum: ChannelId(1001),
        })
        .into_interface("evt-1");
        assert_eq!(interface.user_message(), "This command can only be used in <#1001>");

        let interface = super::EventHandlerError::from(PlatformError::Request("502".to_owned()))
            .into_interface("evt-2");
        assert!(!interface.user_message().contains("502"));
    }
}
