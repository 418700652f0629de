//! The factored context-tree-weighting predictor.
//!
//! A [`ContextTree`] is a single binary CTW model: an incrementally
//! updatable Bayesian mixture over all tree sources up to a fixed depth,
//! with exact rollback of recent updates. A [`FactoredContextTree`] is a
//! fixed-width tuple of them, one per bit position in a percept block,
//! sharing one history.

mod factored;
mod node;
mod tree;

pub use factored::FactoredContextTree;
pub use tree::{ContextFn, ContextTree};
