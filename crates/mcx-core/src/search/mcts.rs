//! rho-UCT Monte-Carlo tree search.
//!
//! One sample is a depth-first pass through alternating decision and
//! chance nodes of an expectimax tree, simulated inside the agent's own
//! world model and rolled back completely before the next sample. Workers
//! (one per hive member) share only the node pool and a sample counter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcx_common::Action;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::node::{NodePool, NodeStats, SearchNode};
use super::SearchError;
use crate::agent::{Agent, Hive, ModelUndo};
use crate::config::SearchConfig;

/// A decision node is expanded only after this many visits.
const MIN_VISITS_BEFORE_EXPANSION: u64 = 1;

/// Samples never descend past this depth; beyond it they play out.
const MAX_DISTANCE_FROM_ROOT: u32 = 100;

/// Priority of a never-visited child in the UCB scan.
const UNEXPLORED_BIAS: f64 = 1e9;

/// Scale of the uniform noise used to break ties.
const TIE_BREAK_NOISE: f64 = 1e-4;

/// Cooperative cancellation signal; always absorbed by the worker loop.
pub(super) struct OutOfTime;

/// State shared by every worker of one planner invocation.
struct SearchContext<'a> {
    pool: &'a NodePool,
    samples: &'a Mutex<u64>,
    max_samples: u64,
    deadline: Option<Instant>,
}

impl SearchContext<'_> {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Run the tree search and return the best action at the root.
pub fn mcts(hive: &mut Hive, config: &SearchConfig, rng: &mut StdRng) -> Result<Action, SearchError> {
    let pool = NodePool::with_capacity_bytes(config.memsearch_mb * 1024 * 1024);
    let max_samples = config.mc_simulations.unwrap_or(u64::MAX);
    let deadline = config
        .cycle_length_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let root = pool
        .find_or_create(hive.primary().hash(), false)
        .ok_or(SearchError::NodeAlloc)?;

    let samples = Mutex::new(0u64);
    let context = SearchContext {
        pool: &pool,
        samples: &samples,
        max_samples,
        deadline,
    };

    // every worker gets a private rng, derived here so a seeded caller
    // stays reproducible with threads=1
    let seeds: Vec<u64> = (0..hive.count()).map(|_| rng.gen()).collect();

    std::thread::scope(|scope| {
        for (agent, &seed) in hive.members_mut().iter_mut().zip(&seeds) {
            let root = Arc::clone(&root);
            let context = &context;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                sample_worker(&root, context, agent, &mut rng);
            });
        }
    });

    tracing::info!(
        samples = *samples.lock(),
        nodes = pool.len(),
        "mcts decision"
    );

    Ok(select_best(hive.primary_mut(), &pool, rng))
}

/// Grow the tree by successive sampling until a budget lapses.
fn sample_worker(root: &SearchNode, context: &SearchContext<'_>, agent: &mut Agent, rng: &mut StdRng) {
    loop {
        {
            let mut samples = context.samples.lock();
            if *samples >= context.max_samples {
                break;
            }
            *samples += 1;
        }
        if context.expired() {
            break;
        }
        match sample(root, context, agent, rng, 0) {
            Ok(_) => {}
            // the budget lapsed mid-sample; the agent is already restored
            Err(OutOfTime) => break,
        }
    }
}

/// One sample pass through `node`, returning the accumulated reward from
/// here to the horizon. The agent is restored before returning, on the
/// error path included.
fn sample(
    node: &SearchNode,
    context: &SearchContext<'_>,
    agent: &mut Agent,
    rng: &mut StdRng,
    dfr: u32,
) -> Result<f64, OutOfTime> {
    if dfr as usize == agent.horizon() * 2 {
        return Ok(0.0);
    }

    let undo = ModelUndo::new(agent);
    let reward;

    if node.is_chance() {
        // sample a percept from the model and descend into its decision child
        let percept = agent.gen_percept_and_update(rng);
        let immediate = agent.reward_from_percept(&percept);

        let sampled = match context.pool.find_or_create(agent.hash(), false) {
            Some(child) => sample(&child, context, agent, rng, dfr + 1),
            // pool exhausted: score the rest of the horizon with a playout
            None => playout(agent, rng, remaining_horizon(agent, dfr + 1), context.deadline),
        };
        agent.model_revert(&undo);
        reward = immediate + sampled?;
    } else {
        if context.expired() {
            return Err(OutOfTime);
        }

        let stats = node.lock_stats();
        let do_playout = stats.visits < MIN_VISITS_BEFORE_EXPANSION
            || dfr >= MAX_DISTANCE_FROM_ROOT
            || context.pool.is_full();

        if do_playout {
            drop(stats);
            reward = playout(agent, rng, remaining_horizon(agent, dfr), context.deadline)?;
        } else {
            let action = select_ucb_action(&stats, agent, context.pool, rng);
            drop(stats);

            agent.act(action);
            let sampled = match context.pool.find_or_create(agent.hash(), true) {
                Some(child) => sample(&child, context, agent, rng, dfr + 1),
                None => {
                    // no room for the chance child: finish the cycle by hand
                    // and play out the remainder
                    let undo_percept = ModelUndo::new(agent);
                    let percept = agent.gen_percept_and_update(rng);
                    let immediate = agent.reward_from_percept(&percept);
                    let tail =
                        playout(agent, rng, remaining_horizon(agent, dfr + 2), context.deadline);
                    agent.model_revert(&undo_percept);
                    tail.map(|t| immediate + t)
                }
            };
            agent.model_revert(&undo);
            reward = sampled?;
        }
    }

    node.record_sample(reward);
    Ok(reward)
}

/// Cycles left to simulate below depth-from-root `dfr`.
fn remaining_horizon(agent: &Agent, dfr: u32) -> usize {
    agent.horizon() - (dfr as usize) / 2
}

/// UCB child selection at a decision node. `stats` is the parent's, held
/// under its node lock by the caller.
fn select_ucb_action(
    stats: &NodeStats,
    agent: &Agent,
    pool: &NodePool,
    rng: &mut StdRng,
) -> Action {
    // exploring stays worthwhile until the reward scale saturates
    let explore_bias = agent.horizon() as f64 * agent.max_reward();

    let mut best_action: Action = 0;
    let mut best_priority = f64::NEG_INFINITY;

    for action in 0..agent.num_actions() {
        let child = pool.find(agent.hash_after_action(action));
        let noise = rng.gen::<f64>() * TIE_BREAK_NOISE;

        let priority = match child {
            Some(child) => {
                let (mean, visits) = child.snapshot();
                debug_assert!(child.is_chance());
                if visits == 0 {
                    UNEXPLORED_BIAS + noise
                } else {
                    let parent_visits = stats.visits as f64;
                    let bias =
                        explore_bias * (2.0 * parent_visits.ln() / visits as f64).sqrt();
                    mean + bias + noise
                }
            }
            None => UNEXPLORED_BIAS + noise,
        };

        if priority > best_priority {
            best_action = action;
            best_priority = priority;
        }
    }

    best_action
}

/// The action whose chance child carries the best sampled mean.
fn select_best(agent: &mut Agent, pool: &NodePool, rng: &mut StdRng) -> Action {
    let mut best_action: Action = 0;
    let mut best_expectation = f64::NEG_INFINITY;

    for action in 0..agent.num_actions() {
        if let Some(node) = pool.find(agent.hash_after_action(action)) {
            let (mean, visits) = node.snapshot();
            let noise = rng.gen::<f64>() * TIE_BREAK_NOISE;
            tracing::debug!(
                action,
                mean,
                visits,
                self_prob = agent.predicted_action_prob(action),
                "action statistics"
            );
            if mean + noise > best_expectation {
                best_expectation = mean + noise;
                best_action = action;
            }
        }
    }

    best_action
}

/// Simulate `playout_len` full (action, percept) cycles inside the model,
/// then roll every update back; returns the reward gathered along the way.
pub(super) fn playout(
    agent: &mut Agent,
    rng: &mut StdRng,
    playout_len: usize,
    deadline: Option<Instant>,
) -> Result<f64, OutOfTime> {
    let start_reward = agent.total_reward();
    let mut undos: Vec<ModelUndo> = Vec::with_capacity(playout_len * 2);
    let mut out_of_time = false;

    for _ in 0..playout_len {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            out_of_time = true;
            break;
        }

        undos.push(ModelUndo::new(agent));
        let action = agent.gen_action(rng);
        agent.act(action);

        undos.push(ModelUndo::new(agent));
        agent.gen_percept_and_update(rng);
    }

    let reward = agent.total_reward() - start_reward;
    for undo in undos.iter().rev() {
        agent.model_revert(undo);
    }

    if out_of_time {
        Err(OutOfTime)
    } else {
        Ok(reward)
    }
}
