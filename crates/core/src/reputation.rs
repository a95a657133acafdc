//! Reputation to level mapping.
//!
//! A member's level is the number of thresholds in [`LEVEL_THRESHOLDS`] that
//! their reputation has reached. Reaching a threshold exactly counts: with
//! the table below, reputation `5` is level 1 and reputation `4` is level 0.
//! Negative reputation is allowed and maps to level 0.

use serde::{Deserialize, Serialize};

pub const LEVEL_THRESHOLDS: [i64; 9] = [5, 25, 50, 100, 175, 250, 500, 1000, 2500];

pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelChange {
    LevelUp,
    LevelDown,
    Same,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationChange {
    pub transition: LevelChange,
    pub previous_level: u32,
    pub new_level: u32,
    pub reputation: i64,
}

impl ReputationChange {
    pub fn between(previous_level: u32, new_level: u32, reputation: i64) -> Self {
        let transition = match new_level.cmp(&previous_level) {
            std::cmp::Ordering::Greater => LevelChange::LevelUp,
            std::cmp::Ordering::Less => LevelChange::LevelDown,
            std::cmp::Ordering::Equal => LevelChange::Same,
        };
        Self { transition, previous_level, new_level, reputation }
    }

    pub fn is_level_up(&self) -> bool {
        self.transition == LevelChange::LevelUp
    }
}

pub fn level_from_reputation(reputation: i64) -> u32 {
    // Upper-bound search: thresholds equal to `reputation` are counted as reached.
    LEVEL_THRESHOLDS.partition_point(|threshold| *threshold <= reputation) as u32
}

/// Points missing until the next level, or `None` once the last threshold is reached.
pub fn remaining_to_next_level(reputation: i64, level: u32) -> Option<i64> {
    LEVEL_THRESHOLDS.get(level as usize).map(|threshold| threshold - reputation)
}
