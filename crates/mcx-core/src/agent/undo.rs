//! Undo records for speculative agent updates.

use mcx_common::{Age, Reward};
use serde::{Deserialize, Serialize};

use super::Agent;

/// Everything needed to roll an agent back to an earlier state without
/// re-simulating history.
///
/// Contract: a record is only valid against the agent it was taken from,
/// and only while no non-speculative mutation has happened in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUndo {
    age: Age,
    hash: u64,
    total_reward: Reward,
    history_size: usize,
    last_update_percept: bool,
}

impl ModelUndo {
    /// Snapshot the scalar state of an agent.
    pub fn new(agent: &Agent) -> Self {
        ModelUndo {
            age: agent.age(),
            hash: agent.hash(),
            total_reward: agent.total_reward(),
            history_size: agent.history_size(),
            last_update_percept: agent.last_update_was_percept(),
        }
    }

    pub fn age(&self) -> Age {
        self.age
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn total_reward(&self) -> Reward {
        self.total_reward
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn last_update_percept(&self) -> bool {
        self.last_update_percept
    }
}
