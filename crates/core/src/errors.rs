use thiserror::Error;

use crate::domain::ticket::ThreadId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("ticket in thread {thread_id} is already resolved")]
    TicketAlreadyResolved { thread_id: ThreadId },
    #[error("signup field `{field}` must be {min}..={max} characters, got {actual}")]
    InvalidSignup { field: &'static str, min: usize, max: usize, actual: usize },
    #[error("review duration of {requested_secs}s is outside 1..={max_secs}s")]
    InvalidReviewDuration { requested_secs: i64, max_secs: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("rejected: {message}")]
    Rejected { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show to the member who triggered the failing action.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "Something went wrong on our side. Please try again in a moment."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Rejected { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Rejected { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }

    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::Precondition(_) | Self::NotFound(_))
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::Rejected { message: error.to_string(), correlation_id }
            }
            ApplicationError::Precondition(message) | ApplicationError::NotFound(message) => {
                Self::Rejected { message, correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::ticket::ThreadId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_rejection_with_specific_message() {
        let interface = ApplicationError::from(DomainError::TicketAlreadyResolved {
            thread_id: ThreadId(9),
        })
        .into_interface("evt-1");

        assert!(matches!(
            interface,
            InterfaceError::Rejected { ref correlation_id, .. } if correlation_id == "evt-1"
        ));
        assert_eq!(interface.user_message(), "ticket in thread 9 is already resolved");
    }

    #[test]
    fn not_found_is_user_facing() {
        let error = ApplicationError::NotFound("no ticket for this thread".to_owned());
        assert!(error.is_user_facing());
        assert_eq!(error.into_interface("evt-2").user_message(), "no ticket for this thread");
    }

    #[test]
    fn persistence_error_hides_details_from_users() {
        let interface =
            ApplicationError::Persistence("database is locked".to_owned()).into_interface("evt-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(!interface.user_message().contains("locked"));
        assert_eq!(interface.correlation_id(), "evt-3");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing channel".to_owned()).into_interface("evt-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
