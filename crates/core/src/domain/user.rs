use serde::{Deserialize, Serialize};

use crate::reputation::{level_from_reputation, ReputationChange};

/// Platform-assigned member id (a Discord snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub reputation: i64,
    pub level: u32,
    pub asked_questions: u32,
    pub resolved_questions: u32,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self { id, reputation: 0, level: 0, asked_questions: 0, resolved_questions: 0 }
    }

    /// Moves reputation by `amount` and recomputes the level in the same step.
    pub fn apply_reputation_delta(&mut self, amount: i64) -> ReputationChange {
        self.assign_reputation(self.reputation.saturating_add(amount))
    }

    pub fn set_reputation(&mut self, amount: i64) -> ReputationChange {
        self.assign_reputation(amount)
    }

    fn assign_reputation(&mut self, reputation: i64) -> ReputationChange {
        let previous_level = self.level;
        let level = level_from_reputation(reputation);

        self.reputation = reputation;
        self.level = level;

        ReputationChange::between(previous_level, level, reputation)
    }

    pub fn record_question_asked(&mut self) {
        self.asked_questions = self.asked_questions.saturating_add(1);
    }

    pub fn record_question_resolved(&mut self) {
        self.resolved_questions = self.resolved_questions.saturating_add(1);
    }
}
