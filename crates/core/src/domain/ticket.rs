use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const DEFAULT_BOUNTY: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub i64);

/// Forum thread hosting exactly one ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub i64);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Burning` is a valid stored value but no transition leads into or out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Created,
    Burning,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Burning => "burning",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "burning" => Some(Self::Burning),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Regular,
    Golden,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Golden => "golden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "regular" => Some(Self::Regular),
            "golden" => Some(Self::Golden),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub thread_id: ThreadId,
    pub owner: UserId,
    pub helper: Option<UserId>,
    pub bounty: i64,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn is_resolved(&self) -> bool {
        self.status == TicketStatus::Resolved
    }

    pub fn is_self_resolved(&self) -> bool {
        self.helper == Some(self.owner)
    }

    /// Helper, resolution time and status are set together, once.
    pub fn resolve(&mut self, helper: UserId, at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.is_resolved() {
            return Err(DomainError::TicketAlreadyResolved { thread_id: self.thread_id });
        }

        self.helper = Some(helper);
        self.resolved_at = Some(at);
        self.status = TicketStatus::Resolved;
        Ok(())
    }
}
