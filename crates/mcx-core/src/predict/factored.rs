//! A fixed-width tuple of context trees sharing one history.

use mcx_common::{Symbol, SymbolList};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::tree::{ContextFn, ContextTree};

/// K independent context trees, one per bit position in a percept block.
///
/// Updating factor `i` with a symbol also appends that symbol to every
/// other factor's history, so all K histories stay identical in content
/// and length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoredContextTree {
    factors: Vec<ContextTree>,
}

impl FactoredContextTree {
    /// Create `num_factors` trees of the same depth.
    pub fn new(num_factors: usize, depth: usize) -> Self {
        debug_assert!(num_factors > 0);
        FactoredContextTree {
            factors: (0..num_factors).map(|_| ContextTree::new(depth)).collect(),
        }
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn depth(&self) -> usize {
        self.factors[0].depth()
    }

    /// Length of the shared history (identical across factors).
    pub fn history_size(&self) -> usize {
        self.factors[0].history_size()
    }

    /// Total live nodes across all factors.
    pub fn size(&self) -> usize {
        self.factors.iter().map(|f| f.size()).sum()
    }

    pub fn factor(&self, offset: usize) -> &ContextTree {
        &self.factors[offset]
    }

    /// The `n`'th history symbol, oldest first.
    pub fn nth_history_symbol(&self, n: usize) -> Option<Symbol> {
        self.factors[0].nth_history_symbol(n)
    }

    /// Sum of the factors' log block probabilities.
    pub fn log_block_probability(&self) -> f64 {
        self.factors.iter().map(|f| f.log_block_probability()).sum()
    }

    /// Update every factor with its own symbol of the block.
    pub fn update(&mut self, symbols: &[Symbol]) {
        assert_eq!(symbols.len(), self.factors.len(), "block width mismatch");
        for (offset, &sym) in symbols.iter().enumerate() {
            self.update_factor(offset, sym);
        }
    }

    /// Update one factor's model, appending the symbol to every other
    /// factor's history.
    fn update_factor(&mut self, offset: usize, sym: Symbol) {
        self.factors[offset].update(sym);
        for (i, factor) in self.factors.iter_mut().enumerate() {
            if i != offset {
                factor.push_history(sym);
            }
        }
    }

    /// Append symbols to every factor's history without touching the trees.
    pub fn update_history(&mut self, symbols: &[Symbol]) {
        for factor in &mut self.factors {
            factor.update_history(symbols);
        }
    }

    /// Undo the most recent `update` on factor `offset`, popping one
    /// history entry from every other factor.
    pub fn revert(&mut self, offset: usize) {
        self.factors[offset].revert();
        for (i, factor) in self.factors.iter_mut().enumerate() {
            if i != offset {
                factor.pop_history();
            }
        }
    }

    /// Shrink every factor's history to a former size.
    pub fn revert_history(&mut self, new_size: usize) {
        for factor in &mut self.factors {
            factor.revert_history(new_size);
        }
    }

    /// The probability of observing a whole block next, given the history.
    pub fn predict(&mut self, symbols: &[Symbol]) -> f64 {
        if symbols.is_empty() {
            return 1.0;
        }
        if self.history_size() + symbols.len() <= self.depth() {
            return 2f64.powi(-(symbols.len() as i32));
        }

        let log_prob_history = self.log_block_probability();
        self.update(symbols);
        let log_prob_block_and_history = self.log_block_probability();
        for offset in (0..symbols.len()).rev() {
            self.revert(offset);
        }

        (log_prob_block_and_history - log_prob_history).exp()
    }

    /// Draw one symbol per factor and commit the draws.
    ///
    /// Past warm-up each factor is sampled by guess-and-verify: update with
    /// the factor's most frequent symbol first, measure the resulting
    /// conditional probability `p`, and with probability `1 - p` roll back
    /// and commit the flipped symbol instead.
    pub fn gen_random_symbols_and_update(
        &mut self,
        rng: &mut impl Rng,
        bits: usize,
    ) -> SymbolList {
        assert_eq!(bits, self.factors.len(), "block width mismatch");

        let mut symbols = SymbolList::with_capacity(bits);
        for offset in 0..bits {
            if self.history_size() + symbols.len() <= self.factors[offset].depth() {
                // not enough context to condition on; flip a fair coin
                let sym = Symbol::from_bit(rng.gen::<f64>() >= 0.5);
                symbols.push(sym);
                self.update_factor(offset, sym);
            } else {
                let log_prob_history = self.log_block_probability();

                let guess = self.factors[offset].most_frequent_sym();
                self.update_factor(offset, guess);
                let p = (self.log_block_probability() - log_prob_history).exp();
                symbols.push(guess);

                if rng.gen::<f64>() >= p {
                    let flipped = guess.flip();
                    self.revert(offset);
                    self.update_factor(offset, flipped);
                    symbols[offset] = flipped;
                }
            }
        }
        symbols
    }

    /// Draw one symbol per factor and restore the trees afterwards.
    pub fn gen_random_symbols(&mut self, rng: &mut impl Rng, bits: usize) -> SymbolList {
        let symbols = self.gen_random_symbols_and_update(rng, bits);
        for offset in (0..bits).rev() {
            self.revert(offset);
        }
        symbols
    }

    /// Clear every factor.
    pub fn clear(&mut self) {
        for factor in &mut self.factors {
            factor.clear();
        }
    }

    /// Install the context hook on every factor.
    pub fn set_context_fn(&mut self, context_fn: Option<ContextFn>) {
        for factor in &mut self.factors {
            factor.set_context_fn(context_fn.clone());
        }
    }
}
