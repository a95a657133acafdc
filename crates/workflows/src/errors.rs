use thiserror::Error;
use tokio::task::JoinError;

use helpbot_core::domain::review::ReviewId;
use helpbot_core::domain::ticket::ThreadId;
use helpbot_core::domain::user::UserId;
use helpbot_core::errors::{ApplicationError, DomainError};
use helpbot_db::RepositoryError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("no ticket exists for thread {thread_id}")]
    NotFound { thread_id: ThreadId },
    #[error("ticket in thread {thread_id} is already resolved")]
    AlreadyResolved { thread_id: ThreadId },
    #[error("thread {thread_id} already has a ticket")]
    AlreadyExists { thread_id: ThreadId },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("review {review_id} is already collecting signups")]
    AlreadyActive { review_id: ReviewId },
    #[error("no review is collecting signups right now")]
    Inactive,
    #[error("member {participant} already signed up for this review")]
    AlreadyPresent { participant: UserId },
    #[error("invalid signup: {0}")]
    InvalidForm(DomainError),
    #[error("invalid review duration: {0}")]
    InvalidDuration(DomainError),
    #[error("could not post the signup announcement: {0}")]
    Announcement(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Failure of the deferred close task, as observed by whoever joins it.
#[derive(Debug, Error)]
pub enum ScheduledCloseError {
    #[error("scheduled close failed: {0}")]
    Close(#[from] ReviewError),
    #[error("scheduled close task did not finish: {0}")]
    Join(#[from] JoinError),
}

macro_rules! from_sqlx {
    ($($error:ty),+) => {
        $(impl From<sqlx::Error> for $error {
            fn from(value: sqlx::Error) -> Self {
                Self::Repository(RepositoryError::Database(value))
            }
        })+
    };
}

from_sqlx!(LedgerError, TicketError, ReviewError);

impl From<LedgerError> for ApplicationError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

impl From<TicketError> for ApplicationError {
    fn from(value: TicketError) -> Self {
        match value {
            TicketError::NotFound { .. } => Self::NotFound(value.to_string()),
            TicketError::AlreadyResolved { thread_id } => {
                Self::Domain(DomainError::TicketAlreadyResolved { thread_id })
            }
            TicketError::AlreadyExists { .. } => Self::Precondition(value.to_string()),
            TicketError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}

impl From<ReviewError> for ApplicationError {
    fn from(value: ReviewError) -> Self {
        match value {
            ReviewError::AlreadyActive { .. }
            | ReviewError::Inactive
            | ReviewError::AlreadyPresent { .. } => Self::Precondition(value.to_string()),
            ReviewError::InvalidForm(error) | ReviewError::InvalidDuration(error) => {
                Self::Domain(error)
            }
            ReviewError::Announcement(message) => Self::Integration(message),
            ReviewError::Repository(error) => Self::Persistence(error.to_string()),
        }
    }
}
