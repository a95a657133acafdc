pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod reputation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::member::{subscription_level, RoleId, SubscriptionTier};
pub use domain::review::{MessageId, Review, ReviewId, ReviewWindow, SignupEntry, SignupForm};
pub use domain::ticket::{ThreadId, Ticket, TicketId, TicketPriority, TicketStatus};
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use notifications::{
    InMemoryNotificationSink, Notification, NotificationEnvelope, NotificationError,
    NotificationHandler, NotificationKind, NotificationRouter,
};
pub use reputation::{
    level_from_reputation, remaining_to_next_level, LevelChange, ReputationChange,
};
