//! The agent state machine.
//!
//! An [`Agent`] couples a factored context-tree world model with an
//! optional self-model of its own action policy, plus the scalar state a
//! cycle accumulates: history hash, age, total reward, and the
//! action/percept alternation flag.

mod hive;
mod undo;

pub use hive::Hive;
pub use undo::ModelUndo;

use mcx_common::{
    hash_after_symbols, Action, Age, Reward, Symbol, SymbolList, HISTORY_HASH_SEED,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::predict::{ContextFn, ContextTree, FactoredContextTree};

/// A learning agent interacting over a two-way binary channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    config: AgentConfig,
    action_bits: u32,
    world_model: FactoredContextTree,
    self_model: Option<ContextTree>,
    hash: u64,
    time_cycle: Age,
    last_update_percept: bool,
    total_reward: Reward,
    id: usize,
}

impl Agent {
    /// Construct a fresh agent from a validated configuration.
    pub fn new(config: AgentConfig, id: usize) -> Self {
        let depth = config.ct_depth as usize;
        let world_model = FactoredContextTree::new(config.percept_bits() as usize, depth);
        let self_model = config
            .bootstrapped_playouts
            .then(|| ContextTree::new(depth));
        let action_bits = config.action_bits();

        Agent {
            config,
            action_bits,
            world_model,
            self_model,
            hash: HISTORY_HASH_SEED,
            time_cycle: 0,
            last_update_percept: false,
            total_reward: 0.0,
            id,
        }
    }

    /// Clear the model and history; the configuration is preserved.
    pub fn reset(&mut self) {
        self.world_model.clear();
        if let Some(self_model) = &mut self.self_model {
            self_model.clear();
        }
        self.hash = HISTORY_HASH_SEED;
        self.time_cycle = 0;
        self.last_update_percept = false;
        self.total_reward = 0.0;
    }

    // ── accessors ──────────────────────────────────────────────────────

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn num_actions(&self) -> u32 {
        self.config.actions
    }

    pub fn action_bits(&self) -> u32 {
        self.action_bits
    }

    pub fn percept_bits(&self) -> usize {
        self.config.percept_bits() as usize
    }

    pub fn horizon(&self) -> usize {
        self.config.horizon as usize
    }

    /// Age in completed cycles.
    pub fn age(&self) -> Age {
        self.time_cycle
    }

    /// Hash of the entire history sequence.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn total_reward(&self) -> Reward {
        self.total_reward
    }

    /// Average reward per completed cycle.
    pub fn average_reward(&self) -> Reward {
        if self.time_cycle > 0 {
            self.total_reward / self.time_cycle as Reward
        } else {
            0.0
        }
    }

    /// Largest reward a single percept can carry.
    pub fn max_reward(&self) -> Reward {
        self.config.max_reward()
    }

    pub fn min_reward(&self) -> Reward {
        0.0
    }

    /// Length of the stored history (identical across world-model factors).
    pub fn history_size(&self) -> usize {
        self.world_model.history_size()
    }

    /// Total nodes in the world model.
    pub fn model_size(&self) -> usize {
        self.world_model.size()
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn use_self_model(&self) -> bool {
        self.self_model.is_some()
    }

    pub fn last_update_was_percept(&self) -> bool {
        self.last_update_percept
    }

    pub fn is_action_ok(&self, action: Action) -> bool {
        action < self.config.actions
    }

    /// Deep copy with a fresh identification number.
    pub fn clone_with_id(&self, id: usize) -> Self {
        let mut copy = self.clone();
        copy.id = id;
        copy
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// Install the context hook on the world model.
    pub fn set_context_fn(&mut self, context_fn: Option<ContextFn>) {
        self.world_model.set_context_fn(context_fn);
    }

    // ── model updates ──────────────────────────────────────────────────

    /// Incorporate a percept from the environment.
    ///
    /// Contract: percepts and actions strictly alternate, and the percept
    /// is exactly `obs_bits + reward_bits` wide.
    pub fn observe(&mut self, percept: &[Symbol]) {
        assert_eq!(percept.len(), self.percept_bits(), "percept width mismatch");
        assert!(
            !self.last_update_percept,
            "observe called twice without an intervening act"
        );
        self.world_model.update(percept);
        self.after_percept(percept);
    }

    /// The bookkeeping shared by `observe` and `gen_percept_and_update`:
    /// everything a percept changes outside the world-model trees.
    fn after_percept(&mut self, percept: &[Symbol]) {
        // the self-model learns actions only; percepts enter its history untrained
        if let Some(self_model) = &mut self.self_model {
            self_model.update_history(percept);
        }
        self.hash = hash_after_symbols(self.hash, percept);
        self.total_reward += self.reward_from_percept(percept);
        self.last_update_percept = true;
    }

    /// Incorporate an action the agent performed.
    ///
    /// The agent's own actions are appended to the world model's history
    /// without a tree update: the model predicts the environment, not the
    /// agent.
    pub fn act(&mut self, action: Action) {
        assert!(self.is_action_ok(action), "action out of range");
        assert!(
            self.last_update_percept,
            "act called before observing a percept"
        );

        let action_syms = self.encode_action(action);
        self.world_model.update_history(&action_syms);
        if let Some(self_model) = &mut self.self_model {
            self_model.update_block(&action_syms);
        }
        self.hash = hash_after_symbols(self.hash, &action_syms);
        self.time_cycle += 1;
        self.last_update_percept = false;
    }

    /// Revert to the state captured in `undo`; false if the record does not
    /// belong to this agent's past.
    pub fn model_revert(&mut self, undo: &ModelUndo) -> bool {
        debug_assert!(self.history_size() >= undo.history_size());
        if self.time_cycle < undo.age() {
            return false;
        }

        // scalars first: anything the context hook reads must already be
        // back in the past
        self.time_cycle = undo.age();
        self.hash = undo.hash();
        self.total_reward = undo.total_reward();
        self.last_update_percept = undo.last_update_percept();

        if undo.last_update_percept() {
            // the updates being undone are action symbols: history only
            self.world_model.revert_history(undo.history_size());
            if let Some(self_model) = &mut self.self_model {
                let excess = self_model.history_size() - undo.history_size();
                for _ in 0..excess {
                    self_model.revert();
                }
            }
        } else {
            // the updates being undone are percept symbols: undo the tree
            // updates in reverse factor order
            let excess = self.world_model.history_size() - undo.history_size();
            let percept_bits = self.percept_bits();
            for i in 0..excess {
                self.world_model.revert(percept_bits - i - 1);
            }
            if let Some(self_model) = &mut self.self_model {
                self_model.revert_history(undo.history_size());
            }
        }

        debug_assert!(
            self.self_model
                .as_ref()
                .map_or(true, |m| m.history_size() == self.world_model.history_size())
        );
        true
    }

    // ── sampling ───────────────────────────────────────────────────────

    /// A legal action uniformly at random.
    pub fn select_random_action(&self, rng: &mut impl Rng) -> Action {
        rng.gen_range(0..self.config.actions)
    }

    /// An action distributed according to the agent's own history
    /// statistics; uniform when no self-model is kept.
    pub fn gen_action(&mut self, rng: &mut impl Rng) -> Action {
        let num_actions = self.config.actions;
        let bits = self.action_bits as usize;
        match self.self_model.as_mut() {
            Some(self_model) => loop {
                // rejection sampling over the encodable superset
                let symbols = self_model.gen_random_symbols_no_commit(rng, bits);
                if let Some(action) = decode_action(&symbols, num_actions) {
                    return action;
                }
            },
            None => rng.gen_range(0..num_actions),
        }
    }

    /// A percept distributed according to the world model, leaving the
    /// model untouched.
    pub fn gen_percept(&mut self, rng: &mut impl Rng) -> SymbolList {
        let bits = self.percept_bits();
        self.world_model.gen_random_symbols(rng, bits)
    }

    /// A percept distributed according to the world model, committed to
    /// the model together with the non-tree bookkeeping.
    pub fn gen_percept_and_update(&mut self, rng: &mut impl Rng) -> SymbolList {
        assert!(
            !self.last_update_percept,
            "percept generated without an intervening act"
        );
        let bits = self.percept_bits();
        let percept = self.world_model.gen_random_symbols_and_update(rng, bits);
        self.after_percept(&percept);
        percept
    }

    // ── codecs ─────────────────────────────────────────────────────────

    /// Encode an action as `action_bits` symbols, MSB first.
    pub fn encode_action(&self, action: Action) -> SymbolList {
        debug_assert!(self.is_action_ok(action));
        (0..self.action_bits)
            .map(|i| Symbol::from_bit(action & (1 << (self.action_bits - i - 1)) != 0))
            .collect()
    }

    /// Decode an action block; `None` when the value is out of range.
    pub fn decode_action(&self, symbols: &[Symbol]) -> Option<Action> {
        decode_action(symbols, self.config.actions)
    }

    /// The reward carried by the trailing `reward_bits` of a percept.
    pub fn reward_from_percept(&self, percept: &[Symbol]) -> Reward {
        assert_eq!(percept.len(), self.percept_bits(), "percept width mismatch");
        let reward_syms = &percept[percept.len() - self.config.reward_bits as usize..];
        self.config.reward_encoding.decode(reward_syms)
    }

    // ── hashing ────────────────────────────────────────────────────────

    /// What `hash()` would become if `action` were applied, without
    /// mutating anything. Transposition key of the child chance node.
    pub fn hash_after_action(&self, action: Action) -> u64 {
        debug_assert!(self.is_action_ok(action));
        hash_after_symbols(self.hash, &self.encode_action(action))
    }

    // ── model queries ──────────────────────────────────────────────────

    /// The model's probability of receiving a particular percept next.
    pub fn percept_probability(&mut self, percept: &[Symbol]) -> f64 {
        assert_eq!(percept.len(), self.percept_bits(), "percept width mismatch");
        self.world_model.predict(percept)
    }

    /// Probability of selecting `action` under the agent's model of its
    /// own behaviour, normalised over the legal actions.
    pub fn predicted_action_prob(&mut self, action: Action) -> f64 {
        let num_actions = self.config.actions;
        if self.self_model.is_none() {
            return 1.0 / num_actions as f64;
        }

        let encodings: Vec<SymbolList> =
            (0..num_actions).map(|a| self.encode_action(a)).collect();
        let mut total = 0.0;
        let mut target = 0.0;
        if let Some(self_model) = self.self_model.as_mut() {
            for (a, symbols) in encodings.iter().enumerate() {
                let p = self_model.predict_block(symbols);
                total += p;
                if a as Action == action {
                    target = p;
                }
            }
        }
        debug_assert!(total > 0.0);
        target / total
    }
}

/// Decode an MSB-first action block against an action-set size.
pub(crate) fn decode_action(symbols: &[Symbol], num_actions: u32) -> Option<Action> {
    let mut action: Action = 0;
    for (c, &sym) in symbols.iter().rev().enumerate() {
        if sym.is_on() {
            action |= 1 << c;
        }
    }
    (action < num_actions).then_some(action)
}
