//! Discord integration for helpbot.
//!
//! - **Events** (`events`) - typed gateway envelopes and one handler per event type
//! - **Messages** (`messages`) - message, button and form builders
//! - **Gateway** (`gateway`) - event loop with reconnection logic
//! - **Notifier** (`notifier`) - renders outbound notifications and the signup post
//! - **Platform** (`platform`) - outbound calls: sending messages, moderating threads
//!
//! ```text
//! Gateway → EventDispatcher → Handlers → Workflows → SQLite
//!                                  ↓           ↓
//!                            MessageTemplate  NotificationRouter → PlatformNotifier
//! ```

pub mod events;
pub mod gateway;
pub mod messages;
pub mod notifier;
pub mod platform;

pub use events::{
    default_dispatcher, BotComponents, ChannelId, EventContext, EventDispatcher, GatewayEnvelope,
    GatewayEvent, GuildSettings, HandlerResult, Rejection,
};
pub use gateway::{
    GatewayRunner, GatewayState, GatewayStatus, GatewayTransport, NoopGatewayTransport,
    ReconnectPolicy,
};
pub use notifier::{NotifierChannels, PlatformNotifier};
pub use platform::{
    ForumGateway, LoggingMessageSender, MemberSource, MessageSender, NoopForumGateway,
    StaticMemberSource,
};
