//! Planners: rho-UCT tree search, the naive 1-ply fallback, and
//! controller dispatch.

mod mcts;
mod naive;
mod node;

pub use mcts::mcts;
pub use naive::naive_monte_carlo;
pub use node::{NodePool, NodeStats, SearchNode};

use std::time::Instant;

use mcx_common::Action;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::agent::Hive;
use crate::config::{Controller, SearchConfig};

/// Failures surfaced by the planner.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("could not allocate the search root node")]
    NodeAlloc,
}

/// Pick an action for the current cycle with the configured controller.
pub fn select_action(
    hive: &mut Hive,
    config: &SearchConfig,
    rng: &mut StdRng,
) -> Result<Action, SearchError> {
    let started = Instant::now();

    let action = match config.controller {
        Controller::Mcts => mcts(hive, config, rng)?,
        Controller::Mc => naive_monte_carlo(hive.primary_mut(), config, rng),
        Controller::Random => hive.primary().select_random_action(rng),
    };

    tracing::info!(
        controller = %config.controller,
        elapsed_ms = started.elapsed().as_millis() as u64,
        action,
        "search complete"
    );

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Hive;
    use crate::config::{AgentConfig, Controller, SearchConfig};
    use mcx_common::{Symbol, SymbolList};
    use rand::SeedableRng;

    fn syms(bits: &str) -> SymbolList {
        bits.chars().map(|c| Symbol::from_bit(c == '1')).collect()
    }

    fn agent_config() -> AgentConfig {
        AgentConfig {
            actions: 2,
            ct_depth: 4,
            horizon: 3,
            ..AgentConfig::default()
        }
    }

    /// Train the world model on "reward follows the previous action", with
    /// both actions represented.
    fn trained_hive(threads: usize) -> Hive {
        let mut hive = Hive::new(threads, &agent_config());
        let mut previous: Action = 0;
        for cycle in 0..200 {
            let reward = Symbol::from_bit(previous == 1);
            hive.observe(&[Symbol::Off, reward]);
            previous = (cycle % 2) as Action;
            hive.act(previous);
        }
        let reward = Symbol::from_bit(previous == 1);
        hive.observe(&[Symbol::Off, reward]);
        hive
    }

    #[test]
    fn mcts_prefers_the_rewarding_action() {
        let mut hive = trained_hive(1);
        let config = SearchConfig {
            controller: Controller::Mcts,
            mc_simulations: Some(500),
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let action = select_action(&mut hive, &config, &mut rng).unwrap();
        assert_eq!(action, 1);
    }

    #[test]
    fn mcts_with_several_workers_agrees() {
        let mut hive = trained_hive(4);
        let config = SearchConfig {
            controller: Controller::Mcts,
            threads: 4,
            mc_simulations: Some(800),
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let action = select_action(&mut hive, &config, &mut rng).unwrap();
        assert_eq!(action, 1);
    }

    #[test]
    fn naive_monte_carlo_prefers_the_rewarding_action() {
        let mut hive = trained_hive(1);
        let config = SearchConfig {
            controller: Controller::Mc,
            cycle_length_ms: Some(40),
            mc_simulations: None,
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let action = select_action(&mut hive, &config, &mut rng).unwrap();
        assert_eq!(action, 1);
    }

    #[test]
    fn search_leaves_the_agent_state_untouched() {
        let mut hive = trained_hive(2);
        let hash = hive.primary().hash();
        let age = hive.primary().age();
        let reward = hive.primary().total_reward();
        let history = hive.primary().history_size();

        let config = SearchConfig {
            controller: Controller::Mcts,
            threads: 2,
            mc_simulations: Some(300),
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(4);
        select_action(&mut hive, &config, &mut rng).unwrap();

        for idx in 0..hive.count() {
            let member = hive.get(idx).unwrap();
            assert_eq!(member.hash(), hash);
            assert_eq!(member.age(), age);
            assert_eq!(member.total_reward(), reward);
            assert_eq!(member.history_size(), history);
            assert!(member.last_update_was_percept());
        }
    }

    #[test]
    fn a_tiny_pool_still_returns_an_action() {
        let mut hive = trained_hive(1);
        let config = SearchConfig {
            controller: Controller::Mcts,
            mc_simulations: Some(50),
            memsearch_mb: 0, // one-node pool: everything plays out
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let action = select_action(&mut hive, &config, &mut rng).unwrap();
        assert!(action < 2);
    }

    #[test]
    fn random_controller_returns_legal_actions() {
        let mut hive = Hive::new(1, &agent_config());
        hive.observe(&syms("00"));
        let config = SearchConfig {
            controller: Controller::Random,
            mc_simulations: None,
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..10 {
            let action = select_action(&mut hive, &config, &mut rng).unwrap();
            assert!(action < 2);
        }
    }

    #[test]
    fn wall_clock_budget_terminates() {
        let mut hive = trained_hive(1);
        let config = SearchConfig {
            controller: Controller::Mcts,
            cycle_length_ms: Some(30),
            mc_simulations: None,
            ..SearchConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let started = Instant::now();
        let action = select_action(&mut hive, &config, &mut rng).unwrap();
        assert!(action < 2);
        // generous bound: the budget is 30ms plus one sample of slack
        assert!(started.elapsed().as_millis() < 5_000);
    }
}
