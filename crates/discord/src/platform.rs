//! Outbound calls into the chat platform.
//!
//! Handlers and the notifier only see these traits. The gateway binary wires
//! a real client; tests use the recording implementations below.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use helpbot_core::domain::review::MessageId;
use helpbot_core::domain::ticket::ThreadId;
use helpbot_core::domain::user::UserId;

use crate::events::ChannelId;
use crate::messages::MessageTemplate;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("platform resource not found: {0}")]
    NotFound(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageTarget {
    Channel(ChannelId),
    /// Threaded reply to an existing message.
    Reply { channel: ChannelId, message: MessageId },
    Direct(UserId),
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        target: MessageTarget,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError>;

    /// Strips the interactive components from a posted message.
    async fn clear_components(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError>;
}

/// Thread moderation used by the ticket commands.
#[async_trait]
pub trait ForumGateway: Send + Sync {
    async fn rename_thread(&self, thread: ThreadId, name: &str) -> Result<(), PlatformError>;
    async fn archive_thread(&self, thread: ThreadId) -> Result<(), PlatformError>;
    async fn unarchive_thread(&self, thread: ThreadId) -> Result<(), PlatformError>;
    async fn add_reaction(
        &self,
        thread: ThreadId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError>;
}

/// Current guild membership, read once at startup.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn guild_members(&self) -> Result<Vec<UserId>, PlatformError>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticMemberSource {
    members: Vec<UserId>,
}

impl StaticMemberSource {
    pub fn new(members: Vec<UserId>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl MemberSource for StaticMemberSource {
    async fn guild_members(&self) -> Result<Vec<UserId>, PlatformError> {
        Ok(self.members.clone())
    }
}

/// Sender used when no platform connection is configured: every message is
/// written to the log and gets a locally counted id.
#[derive(Default)]
pub struct LoggingMessageSender {
    next_id: AtomicI64,
}

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send(
        &self,
        target: MessageTarget,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError> {
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        info!(
            event_name = "egress.gateway.message_logged",
            target = ?target,
            message_id = message_id.0,
            text = %message.fallback_text,
            "outbound message"
        );
        Ok(message_id)
    }

    async fn clear_components(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        info!(
            event_name = "egress.gateway.components_cleared",
            channel_id = %channel,
            message_id = message.0,
            "message components cleared"
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct NoopForumGateway;

#[async_trait]
impl ForumGateway for NoopForumGateway {
    async fn rename_thread(&self, _thread: ThreadId, _name: &str) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn archive_thread(&self, _thread: ThreadId) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn unarchive_thread(&self, _thread: ThreadId) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn add_reaction(
        &self,
        _thread: ThreadId,
        _message: MessageId,
        _emoji: &str,
    ) -> Result<(), PlatformError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForumCall {
    Rename { thread: ThreadId, name: String },
    Archive(ThreadId),
    Unarchive(ThreadId),
    React { thread: ThreadId, message: MessageId, emoji: String },
}

#[derive(Clone, Default)]
pub struct RecordingForumGateway {
    calls: Arc<Mutex<Vec<ForumCall>>>,
}

impl RecordingForumGateway {
    pub fn calls(&self) -> Vec<ForumCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: ForumCall) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

#[async_trait]
impl ForumGateway for RecordingForumGateway {
    async fn rename_thread(&self, thread: ThreadId, name: &str) -> Result<(), PlatformError> {
        self.record(ForumCall::Rename { thread, name: name.to_owned() });
        Ok(())
    }

    async fn archive_thread(&self, thread: ThreadId) -> Result<(), PlatformError> {
        self.record(ForumCall::Archive(thread));
        Ok(())
    }

    async fn unarchive_thread(&self, thread: ThreadId) -> Result<(), PlatformError> {
        self.record(ForumCall::Unarchive(thread));
        Ok(())
    }

    async fn add_reaction(
        &self,
        thread: ThreadId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.record(ForumCall::React { thread, message, emoji: emoji.to_owned() });
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub target: MessageTarget,
    pub message: MessageTemplate,
}

#[derive(Default)]
struct SenderState {
    sent: Vec<SentMessage>,
    cleared: Vec<(ChannelId, MessageId)>,
    next_id: i64,
}

/// Keeps every message instead of sending it. Message ids count up from 1.
#[derive(Clone, Default)]
pub struct RecordingMessageSender {
    state: Arc<Mutex<SenderState>>,
    failing: bool,
}

impl RecordingMessageSender {
    /// A sender whose every call fails.
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.with_state(|state| state.sent.clone())
    }

    pub fn cleared(&self) -> Vec<(ChannelId, MessageId)> {
        self.with_state(|state| state.cleared.clone())
    }

    fn with_state<T>(&self, read: impl FnOnce(&mut SenderState) -> T) -> T {
        match self.state.lock() {
            Ok(mut state) => read(&mut state),
            Err(poisoned) => read(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl MessageSender for RecordingMessageSender {
    async fn send(
        &self,
        target: MessageTarget,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError> {
        if self.failing {
            return Err(PlatformError::Request("sender unavailable".to_owned()));
        }
        Ok(self.with_state(|state| {
            state.next_id += 1;
            state.sent.push(SentMessage { target, message: message.clone() });
            MessageId(state.next_id)
        }))
    }

    async fn clear_components(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        if self.failing {
            return Err(PlatformError::Request("sender unavailable".to_owned()));
        }
        self.with_state(|state| state.cleared.push((channel, message)));
        Ok(())
    }
}
