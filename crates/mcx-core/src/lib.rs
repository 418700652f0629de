//! mcx-core — the agent proper.
//!
//! The core couples an online factored context-tree-weighting world model
//! with a Monte-Carlo tree-search planner:
//! - `predict` — context trees with exact update/revert and sampling
//! - `agent` — the agent state machine, undo records, and the hive
//! - `search` — the rho-UCT planner, the naive fallback, and controller dispatch
//! - `config`, `snapshot`, `protocol`, `logging` — the shell around the core
//!
//! The binary entry point is in `main.rs`.

pub mod agent;
pub mod config;
pub mod logging;
pub mod predict;
pub mod protocol;
pub mod search;
pub mod snapshot;
