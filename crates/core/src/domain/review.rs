use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub i64);

impl std::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform message hosting the signup buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// A code-review signup window.
///
/// The window is `[started_at, closed_at]`, inclusive on both ends. Whether the
/// collection is active is decided only by comparing the clock against that
/// window. `finalized_at` records that the close report went out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub started_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub announcement_message_id: MessageId,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.started_at <= now && now <= self.closed_at
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Accepting signups: inside the window and no close report emitted yet.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active_at(now) && !self.is_finalized()
    }

    /// Time left until the window closes, zero once it has elapsed.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.closed_at - now).to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewWindow {
    pub started_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

impl ReviewWindow {
    pub fn starting_at(
        now: DateTime<Utc>,
        duration: Duration,
        max_duration: Duration,
    ) -> Result<Self, DomainError> {
        if duration <= Duration::zero() || duration > max_duration {
            return Err(DomainError::InvalidReviewDuration {
                requested_secs: duration.num_seconds(),
                max_secs: max_duration.num_seconds(),
            });
        }

        Ok(Self { started_at: now, closed_at: now + duration })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    pub repository_url: String,
    pub description: String,
    pub check_modules: Option<String>,
    pub architecture_image_url: Option<String>,
}

pub const REPOSITORY_URL_LEN: (usize, usize) = (25, 100);
pub const DESCRIPTION_LEN: (usize, usize) = (100, 1000);
pub const CHECK_MODULES_MAX_LEN: usize = 200;
pub const IMAGE_URL_MAX_LEN: usize = 100;

impl SignupForm {
    /// Trims every field, drops empty optionals and checks the length limits.
    pub fn validate(self) -> Result<Self, DomainError> {
        let repository_url = self.repository_url.trim().to_owned();
        let description = self.description.trim().to_owned();
        let check_modules = non_empty(self.check_modules);
        let architecture_image_url = non_empty(self.architecture_image_url);

        check_len("repository_url", &repository_url, REPOSITORY_URL_LEN.0, REPOSITORY_URL_LEN.1)?;
        check_len("description", &description, DESCRIPTION_LEN.0, DESCRIPTION_LEN.1)?;
        if let Some(modules) = &check_modules {
            check_len("check_modules", modules, 0, CHECK_MODULES_MAX_LEN)?;
        }
        if let Some(image) = &architecture_image_url {
            check_len("architecture_image_url", image, 0, IMAGE_URL_MAX_LEN)?;
        }

        Ok(Self { repository_url, description, check_modules, architecture_image_url })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), DomainError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::InvalidSignup { field, min, max, actual: len });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupEntry {
    pub review_id: ReviewId,
    pub participant: UserId,
    pub form: SignupForm,
}
