//! Agent and search configuration.
//!
//! The CLI populates these structs; `validate()` enforces every
//! configuration rule before an agent is built, so an invalid combination
//! is fatal at startup rather than a surprise mid-session.

use clap::ValueEnum;
use mcx_common::{Reward, Symbol};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration rule violations. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the number of distinct actions must be at least 2 (got {0})")]
    TooFewActions(u32),

    #[error("the horizon must be at least one")]
    ZeroHorizon,

    #[error("the number of reward bits must be in 1..=32 (got {0})")]
    BadRewardBits(u32),

    #[error("the number of observation bits must be positive")]
    ZeroObservationBits,

    #[error("thread count must be in 1..=32 (got {0})")]
    BadThreadCount(u32),

    #[error("using more than one thread requires controller=mcts")]
    ThreadsRequireMcts,

    #[error("exploration probability must lie within [0, 1] (got {0})")]
    BadExploration(f64),

    #[error("exploration and controller=random are incompatible")]
    ExplorationWithRandom,

    #[error("exploration decay must lie within [0, 1] (got {0})")]
    BadExploreDecay(f64),

    #[error("the number of mc simulations must be positive")]
    ZeroSimulations,

    #[error("mc-simulations and cycle-length-ms are incompatible")]
    ConflictingBudgets,

    #[error("controller=mcts requires mc-simulations or cycle-length-ms")]
    MissingSearchBudget,

    #[error("controller=mc requires cycle-length-ms")]
    MissingCycleBudget,
}

/// How the reward field of a percept is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RewardEncoding {
    /// The reward bits read as an unsigned binary number.
    Base2,
    /// The reward is the number of On bits.
    Bitcount,
}

impl RewardEncoding {
    /// Decode a reward field.
    pub fn decode(self, reward_syms: &[Symbol]) -> Reward {
        match self {
            RewardEncoding::Base2 => {
                let mut r: u64 = 0;
                for (c, &sym) in reward_syms.iter().rev().enumerate() {
                    if sym.is_on() {
                        r |= 1 << c;
                    }
                }
                r as Reward
            }
            RewardEncoding::Bitcount => {
                reward_syms.iter().filter(|s| s.is_on()).count() as Reward
            }
        }
    }
}

impl std::fmt::Display for RewardEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardEncoding::Base2 => write!(f, "base2"),
            RewardEncoding::Bitcount => write!(f, "bitcount"),
        }
    }
}

/// Control algorithm used to pick actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// rho-UCT Monte-Carlo tree search.
    Mcts,
    /// Naive 1-ply Monte-Carlo.
    Mc,
    /// Uniformly random actions.
    Random,
}

impl std::fmt::Display for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Controller::Mcts => write!(f, "mcts"),
            Controller::Mc => write!(f, "mc"),
            Controller::Random => write!(f, "random"),
        }
    }
}

/// Structural configuration of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum depth of the context trees used for prediction.
    #[serde(default = "default_ct_depth")]
    pub ct_depth: u32,

    /// Width of the observation field of a percept.
    #[serde(default = "default_observation_bits")]
    pub observation_bits: u32,

    /// Width of the reward field of a percept.
    #[serde(default = "default_reward_bits")]
    pub reward_bits: u32,

    /// Size of the action set.
    #[serde(default = "default_actions")]
    pub actions: u32,

    /// Number of future (action, percept) pairs the planner looks ahead.
    #[serde(default = "default_horizon")]
    pub horizon: u32,

    #[serde(default = "default_reward_encoding")]
    pub reward_encoding: RewardEncoding,

    /// Keep a self-model of the agent's own policy for playouts.
    #[serde(default)]
    pub bootstrapped_playouts: bool,
}

fn default_ct_depth() -> u32 {
    3
}

fn default_observation_bits() -> u32 {
    1
}

fn default_reward_bits() -> u32 {
    1
}

fn default_actions() -> u32 {
    4
}

fn default_horizon() -> u32 {
    16
}

fn default_reward_encoding() -> RewardEncoding {
    RewardEncoding::Base2
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            ct_depth: default_ct_depth(),
            observation_bits: default_observation_bits(),
            reward_bits: default_reward_bits(),
            actions: default_actions(),
            horizon: default_horizon(),
            reward_encoding: default_reward_encoding(),
            bootstrapped_playouts: false,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actions < 2 {
            return Err(ConfigError::TooFewActions(self.actions));
        }
        if self.horizon < 1 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.reward_bits < 1 || self.reward_bits > 32 {
            return Err(ConfigError::BadRewardBits(self.reward_bits));
        }
        if self.observation_bits < 1 {
            return Err(ConfigError::ZeroObservationBits);
        }
        Ok(())
    }

    /// Width of a whole percept block.
    pub fn percept_bits(&self) -> u32 {
        self.observation_bits + self.reward_bits
    }

    /// Bits needed to encode any action, MSB first.
    pub fn action_bits(&self) -> u32 {
        num_action_bits(self.actions)
    }

    /// Largest reward a single percept can carry under this encoding.
    pub fn max_reward(&self) -> Reward {
        match self.reward_encoding {
            RewardEncoding::Base2 => ((1u64 << self.reward_bits) - 1) as Reward,
            RewardEncoding::Bitcount => self.reward_bits as Reward,
        }
    }
}

/// Configuration of the per-cycle search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_controller")]
    pub controller: Controller,

    /// Search threads; also the hive size.
    #[serde(default = "default_threads")]
    pub threads: u32,

    /// Sample budget per cycle. Mutually exclusive with `cycle_length_ms`.
    #[serde(default)]
    pub mc_simulations: Option<u64>,

    /// Wall-clock budget per cycle, milliseconds.
    #[serde(default)]
    pub cycle_length_ms: Option<u64>,

    /// Node pool cap in megabytes.
    #[serde(default = "default_memsearch_mb")]
    pub memsearch_mb: usize,

    /// Probability of playing a random action each cycle.
    #[serde(default)]
    pub exploration: Option<f64>,

    /// Geometric decay applied to the exploration rate after each cycle.
    #[serde(default = "default_explore_decay")]
    pub explore_decay: f64,

    /// Hard cycle limit for the session.
    #[serde(default)]
    pub terminate_age: Option<u64>,
}

fn default_controller() -> Controller {
    Controller::Mcts
}

fn default_threads() -> u32 {
    1
}

fn default_memsearch_mb() -> usize {
    32
}

fn default_explore_decay() -> f64 {
    1.0
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            controller: default_controller(),
            threads: default_threads(),
            mc_simulations: None,
            cycle_length_ms: None,
            memsearch_mb: default_memsearch_mb(),
            exploration: None,
            explore_decay: default_explore_decay(),
            terminate_age: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads < 1 || self.threads > 32 {
            return Err(ConfigError::BadThreadCount(self.threads));
        }
        if self.threads > 1 && self.controller != Controller::Mcts {
            return Err(ConfigError::ThreadsRequireMcts);
        }

        if let Some(exploration) = self.exploration {
            if self.controller == Controller::Random {
                return Err(ConfigError::ExplorationWithRandom);
            }
            if !(0.0..=1.0).contains(&exploration) {
                return Err(ConfigError::BadExploration(exploration));
            }
        }
        if !(0.0..=1.0).contains(&self.explore_decay) {
            return Err(ConfigError::BadExploreDecay(self.explore_decay));
        }

        if let Some(simulations) = self.mc_simulations {
            if simulations == 0 {
                return Err(ConfigError::ZeroSimulations);
            }
            if self.cycle_length_ms.is_some() {
                return Err(ConfigError::ConflictingBudgets);
            }
        }

        match self.controller {
            Controller::Mcts => {
                if self.mc_simulations.is_none() && self.cycle_length_ms.is_none() {
                    return Err(ConfigError::MissingSearchBudget);
                }
            }
            Controller::Mc => {
                if self.cycle_length_ms.is_none() {
                    return Err(ConfigError::MissingCycleBudget);
                }
            }
            Controller::Random => {}
        }

        Ok(())
    }
}

/// Bits needed to encode actions `0..count` MSB-first, for `count >= 2`.
pub fn num_action_bits(count: u32) -> u32 {
    let mut bits = 1u32;
    let mut reach = 2u64;
    while reach < count as u64 {
        reach *= 2;
        bits += 1;
    }
    bits
}
