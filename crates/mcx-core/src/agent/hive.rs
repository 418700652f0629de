//! A hive of sibling agents, one per search worker.

use mcx_common::{Action, Symbol};

use super::Agent;
use crate::config::AgentConfig;

/// N agents built from identical configuration and kept in lock-step:
/// every percept and action is applied to every member, so during search
/// each worker can own one member as a private replica of the shared
/// state.
#[derive(Debug, Clone)]
pub struct Hive {
    agents: Vec<Agent>,
}

impl Hive {
    /// A hive of `count` fresh agents.
    pub fn new(count: usize, config: &AgentConfig) -> Self {
        debug_assert!(count > 0);
        Hive {
            agents: (0..count).map(|id| Agent::new(config.clone(), id)).collect(),
        }
    }

    /// A hive of `count` deep copies of a single (e.g. loaded) agent.
    pub fn from_agent(count: usize, mut agent: Agent) -> Self {
        debug_assert!(count > 0);
        agent.set_id(0);
        let mut agents = Vec::with_capacity(count);
        agents.push(agent);
        for id in 1..count {
            let copy = agents[0].clone_with_id(id);
            agents.push(copy);
        }
        Hive { agents }
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Agent> {
        self.agents.get(idx)
    }

    /// The member whose statistics represent the hive.
    pub fn primary(&self) -> &Agent {
        &self.agents[0]
    }

    pub fn primary_mut(&mut self) -> &mut Agent {
        &mut self.agents[0]
    }

    /// All members, for handing out one per search worker.
    pub fn members_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Apply a percept to every member, in order.
    pub fn observe(&mut self, percept: &[Symbol]) {
        for agent in &mut self.agents {
            agent.observe(percept);
        }
    }

    /// Apply an action to every member, in order.
    pub fn act(&mut self, action: Action) {
        for agent in &mut self.agents {
            agent.act(action);
        }
    }

    /// Reset every member; configuration is preserved.
    pub fn reset(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
    }
}
