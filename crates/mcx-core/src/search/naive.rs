//! Naive 1-ply Monte-Carlo fallback planner.

use std::time::{Duration, Instant};

use mcx_common::Action;
use rand::rngs::StdRng;
use rand::Rng;

use super::mcts::playout;
use crate::agent::{Agent, ModelUndo};
use crate::config::SearchConfig;

/// Estimate each action's value by committing it, sampling one percept,
/// playing out the remaining horizon, and undoing everything; actions are
/// sampled round-robin until the cycle budget lapses. Returns the action
/// with the best empirical mean, ties broken by noise.
pub fn naive_monte_carlo(agent: &mut Agent, config: &SearchConfig, rng: &mut StdRng) -> Action {
    // the planner runs between a percept and the reply action
    assert!(
        agent.last_update_was_percept(),
        "planner invoked without a fresh percept"
    );

    let budget = config.cycle_length_ms.unwrap_or(0);
    let deadline = Instant::now() + Duration::from_millis(budget);

    let num_actions = agent.num_actions();
    let horizon = agent.horizon();
    let start_history = agent.history_size();

    // (reward sum, sample count) per action
    let mut arms = vec![(0.0f64, 0.0f64); num_actions as usize];
    let mut total_samples = 0u64;
    let mut first_pass = true;

    'sampling: loop {
        for action in 0..num_actions {
            let undo_action = ModelUndo::new(agent);
            agent.act(action);

            let undo_percept = ModelUndo::new(agent);
            let percept = agent.gen_percept_and_update(rng);
            let immediate = agent.reward_from_percept(&percept);

            // the first pass ignores the deadline so every arm gets an estimate
            let pass_deadline = if first_pass { None } else { Some(deadline) };
            let tail = playout(agent, rng, horizon - 1, pass_deadline);

            agent.model_revert(&undo_percept);
            agent.model_revert(&undo_action);
            debug_assert_eq!(agent.history_size(), start_history);

            match tail {
                Ok(tail_reward) => {
                    let arm = &mut arms[action as usize];
                    arm.0 += immediate + tail_reward;
                    arm.1 += 1.0;
                    total_samples += 1;
                }
                Err(_) => break 'sampling,
            }
        }
        first_pass = false;

        if Instant::now() >= deadline {
            break;
        }
    }

    tracing::info!(samples = total_samples, "naive monte-carlo decision");

    let mut best_action: Action = 0;
    let mut best_mean = f64::NEG_INFINITY;
    for (action, &(sum, count)) in arms.iter().enumerate() {
        debug_assert!(count > 0.0);
        let noise = rng.gen::<f64>() * 1e-4;
        let mean = sum / count + noise;
        tracing::debug!(action, mean = sum / count, samples = count, "arm estimate");
        if mean > best_mean {
            best_mean = mean;
            best_action = action as Action;
        }
    }

    best_action
}
