use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{
    DispatchError, EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent, HandlerResult,
};
use crate::messages::{self, MessageTemplate};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport response failed: {0}")]
    Respond(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Where the event loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum GatewayState {
    NotStarted,
    Connecting { attempt: u32 },
    Connected { attempt: u32 },
    /// The stream ended normally.
    Closed,
    RetriesExhausted { attempts: u32 },
}

/// Shared view of the runner's [`GatewayState`], read by the health endpoint.
#[derive(Clone, Debug)]
pub struct GatewayStatus {
    state: Arc<Mutex<GatewayState>>,
}

impl Default for GatewayStatus {
    fn default() -> Self {
        Self { state: Arc::new(Mutex::new(GatewayState::NotStarted)) }
    }
}

impl GatewayStatus {
    pub fn current(&self) -> GatewayState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, next: GatewayState) {
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

/// Connection to the platform's event stream.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    /// Replies to whatever produced the envelope: the interaction, or the thread.
    async fn respond(
        &self,
        envelope_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn respond(
        &self,
        _envelope_id: &str,
        _message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    status: GatewayStatus,
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, status: GatewayStatus::default() }
    }

    pub fn status(&self) -> GatewayStatus {
        self.status.clone()
    }

    /// Pumps envelopes until the stream ends. Transport failures reconnect
    /// with backoff; exhausting the retries ends the loop without an error.
    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        self.status.set(GatewayState::RetriesExhausted { attempts: attempt + 1 });
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening gateway connection");
        self.status.set(GatewayState::Connecting { attempt });
        self.transport.connect().await?;
        info!(attempt, "gateway connected");
        self.status.set(GatewayState::Connected { attempt });

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway stream closed");
                self.status.set(GatewayState::Closed);
                self.transport.disconnect().await?;
                return Ok(());
            };
            self.process(&envelope).await;
        }
    }

    /// Acknowledges, dispatches and answers one envelope. Never fails: a bad
    /// event is logged and the loop moves on.
    pub async fn process(&self, envelope: &GatewayEnvelope) {
        let (thread_id, user_id) = correlation_fields(&envelope.event);

        info!(
            event_name = "ingress.gateway.envelope_received",
            envelope_id = %envelope.envelope_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %envelope.envelope_id,
            thread_id = thread_id.unwrap_or_default(),
            user_id = user_id.unwrap_or_default(),
            "received gateway envelope"
        );

        if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
            warn!(
                event_name = "ingress.gateway.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                error = %error,
                "failed to acknowledge gateway envelope"
            );
        } else {
            debug!(
                event_name = "ingress.gateway.ack_sent",
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                "acknowledged gateway envelope"
            );
        }

        let context = EventContext { correlation_id: envelope.envelope_id.clone() };
        let reply = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(message)) => Some(message),
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => None,
            Err(DispatchError::Handler(interface)) => {
                error!(
                    event_name = "ingress.gateway.dispatch_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    thread_id = thread_id.unwrap_or_default(),
                    user_id = user_id.unwrap_or_default(),
                    error = %interface,
                    "event dispatch failed; continuing gateway loop"
                );
                Some(messages::interface_error_message(&interface))
            }
        };

        if let Some(message) = reply {
            if let Err(error) = self.transport.respond(&envelope.envelope_id, &message).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to send gateway response"
                );
            }
        }
    }
}

fn correlation_fields(event: &GatewayEvent) -> (Option<i64>, Option<i64>) {
    match event {
        GatewayEvent::ThreadCreated(event) => (Some(event.thread_id.0), Some(event.owner_id.0)),
        GatewayEvent::MemberJoined(event) | GatewayEvent::MemberLeft(event) => {
            (None, Some(event.user_id.0))
        }
        GatewayEvent::RolesChanged(event) => (None, Some(event.user_id.0)),
        GatewayEvent::MarkSolution(event) => (Some(event.channel_id.0), Some(event.invoker_id.0)),
        GatewayEvent::SignupRequested(event) | GatewayEvent::SignupRemoved(event) => {
            (None, Some(event.participant_id.0))
        }
        GatewayEvent::SignupSubmitted(event) => (None, Some(event.participant_id.0)),
        GatewayEvent::Command(invocation) => {
            (Some(invocation.channel_id.0), Some(invocation.invoker_id.0))
        }
        GatewayEvent::Unsupported { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use helpbot_core::domain::ticket::ThreadId;
    use helpbot_core::domain::user::UserId;

    use super::{GatewayRunner, GatewayState, GatewayTransport, ReconnectPolicy, TransportError};
    use crate::events::{
        ChannelId, EventDispatcher, GatewayEnvelope, GatewayEvent, ThreadCreatedEvent,
    };
    use crate::messages::MessageTemplate;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<GatewayEnvelope>, TransportError>>,
        connect_attempts: usize,
        acknowledgements: Vec<String>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<GatewayEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn acknowledgements(&self) -> Vec<String> {
            self.state.lock().await.acknowledgements.clone()
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl GatewayTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push(envelope_id.to_owned());
            Ok(())
        }

        async fn respond(
            &self,
            _envelope_id: &str,
            _message: &MessageTemplate,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn unsupported(id: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: id.to_owned(),
            event: GatewayEvent::Unsupported { event_type: "typing_start".to_owned() },
        }
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(unsupported("env-1"))), Ok(None)],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        let status = runner.status();
        assert_eq!(status.current(), GatewayState::NotStarted);
        runner.start().await.expect("runner should not fail");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1"]);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert_eq!(status.current(), GatewayState::Closed);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
        assert_eq!(runner.status().current(), GatewayState::RetriesExhausted { attempts: 3 });
    }

    #[tokio::test]
    async fn read_failure_reconnects_and_keeps_pumping() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(unsupported("env-1"))),
                Err(TransportError::Receive("connection reset".to_owned())),
                Ok(Some(unsupported("env-2"))),
                Ok(None),
            ],
        ));

        let runner = GatewayRunner::new(
            transport.clone(),
            EventDispatcher::default(),
            ReconnectPolicy { max_retries: 1, base_delay_ms: 0, max_delay_ms: 0 },
        );

        runner.start().await.expect("runner");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.acknowledgements().await, vec!["env-1", "env-2"]);
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 350 };
        assert_eq!(policy.backoff(0).as_millis(), 100);
        assert_eq!(policy.backoff(1).as_millis(), 200);
        assert_eq!(policy.backoff(2).as_millis(), 350);
    }

    #[test]
    fn extracts_thread_and_user_correlation_fields() {
        let event = GatewayEvent::ThreadCreated(ThreadCreatedEvent {
            thread_id: ThreadId(44),
            owner_id: UserId(7),
            parent_id: ChannelId(1001),
        });

        assert_eq!(super::correlation_fields(&event), (Some(44), Some(7)));
    }
}
