//! Shared types for the mcx agent <-> environment channel.
//!
//! This crate provides the foundational vocabulary used by every other
//! mcx crate:
//! - Binary symbols and percept-line parsing
//! - The incremental history hash used as a transposition key
//! - Scalar aliases for actions, rewards, and agent age

pub mod hash;
pub mod symbol;

pub use hash::{hash_after_symbol, hash_after_symbols, HISTORY_HASH_SEED};
pub use symbol::{percept_to_symbols, symbols_to_string, Symbol, SymbolError, SymbolList};

/// An agent action, drawn from `0..actions_count`.
pub type Action = u32;

/// Reward accumulated by an agent.
pub type Reward = f64;

/// Age of an agent in completed cycles.
pub type Age = u64;
