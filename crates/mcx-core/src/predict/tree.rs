//! A single binary context tree.

use std::fmt;
use std::sync::Arc;

use mcx_common::{Symbol, SymbolList};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::node::{NodeArena, NodeId};

/// Computes a custom context from the history: given the full history and
/// the tree depth, fills the output buffer with the context symbols, most
/// recent first. When no hook is installed the context is the last `depth`
/// history symbols, reversed.
pub type ContextFn = Arc<dyn Fn(&[Symbol], usize, &mut Vec<Symbol>) + Send + Sync>;

/// An online CTW model over binary symbols with exact rollback.
///
/// Balanced `update`/`revert` pairs return the tree to its prior state:
/// counts and the node set exactly, log probabilities to floating-point
/// tolerance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ContextTree {
    depth: usize,
    history: Vec<Symbol>,
    arena: NodeArena,
    root: NodeId,
    #[serde(skip)]
    context_fn: Option<ContextFn>,
}

impl ContextTree {
    /// Create an empty context tree of the given maximum depth.
    pub fn new(depth: usize) -> Self {
        let mut arena = NodeArena::default();
        let root = arena.alloc();
        ContextTree {
            depth,
            history: Vec::new(),
            arena,
            root,
            context_fn: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Length of the stored history.
    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    /// Number of live nodes.
    pub fn size(&self) -> usize {
        self.arena.live()
    }

    /// The `n`'th history symbol, oldest first.
    pub fn nth_history_symbol(&self, n: usize) -> Option<Symbol> {
        self.history.get(n).copied()
    }

    /// Install (or remove) the hook that computes the context.
    pub fn set_context_fn(&mut self, context_fn: Option<ContextFn>) {
        self.context_fn = context_fn;
    }

    /// The log of the weighted block probability of the whole sequence.
    pub fn log_block_probability(&self) -> f64 {
        self.arena.get(self.root).log_pw
    }

    /// The symbol seen most often at the empty context.
    pub fn most_frequent_sym(&self) -> Symbol {
        let root = self.arena.get(self.root);
        if root.counts[Symbol::On.index()] > root.counts[Symbol::Off.index()] {
            Symbol::On
        } else {
            Symbol::Off
        }
    }

    /// The current context, most recent symbol first.
    fn context(&self) -> Vec<Symbol> {
        if let Some(context_fn) = &self.context_fn {
            let mut out = Vec::with_capacity(self.depth);
            context_fn(&self.history, self.depth, &mut out);
            return out;
        }
        self.history.iter().rev().take(self.depth).copied().collect()
    }

    /// Walk the context from the root, allocating missing nodes, returning
    /// the path root-first.
    fn materialise_path(&mut self, context: &[Symbol]) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(context.len() + 1);
        let mut id = self.root;
        path.push(id);
        for &sym in context {
            let next = match self.arena.get(id).child(sym) {
                Some(child) => child,
                None => {
                    let child = self.arena.alloc();
                    self.arena.get_mut(id).children[sym.index()] = Some(child);
                    child
                }
            };
            path.push(next);
            id = next;
        }
        path
    }

    /// Walk the already-materialised context path, root-first.
    fn existing_path(&self, context: &[Symbol]) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(context.len() + 1);
        let mut id = self.root;
        path.push(id);
        for &sym in context {
            let child = self
                .arena
                .get(id)
                .child(sym)
                .expect("revert without a matching update");
            path.push(child);
            id = child;
        }
        path
    }

    /// Recompute the weighted probability of `id`; the deepest context node
    /// uses the leaf rule `log_pw = log_pe`.
    fn refresh_weighted(&mut self, id: NodeId, leaf: bool) {
        let (log_pe, child_off, child_on) = {
            let node = self.arena.get(id);
            (node.log_pe, node.children[0], node.children[1])
        };
        let log_pw = if leaf {
            log_pe
        } else {
            let off = child_off.map_or(0.0, |c| self.arena.get(c).log_pw);
            let on = child_on.map_or(0.0, |c| self.arena.get(c).log_pw);
            mcx_math::ctw_mix(log_pe, off + on)
        };
        self.arena.get_mut(id).log_pw = log_pw;
    }

    /// Incorporate one new symbol into the model.
    ///
    /// With fewer than `depth` symbols of history the symbol is appended to
    /// the history buffer only.
    pub fn update(&mut self, sym: Symbol) {
        let context = self.context();
        if context.len() < self.depth {
            self.history.push(sym);
            return;
        }

        let path = self.materialise_path(&context);

        // KT estimates and counts from the deepest context back to the root
        for i in (0..path.len()).rev() {
            let id = path[i];
            {
                let node = self.arena.get_mut(id);
                let mul = node.log_kt_mul(sym);
                node.log_pe += mul;
                node.counts[sym.index()] += 1;
            }
            self.refresh_weighted(id, i + 1 == path.len());
        }

        self.history.push(sym);
    }

    /// Update with each symbol of a block, left to right.
    pub fn update_block(&mut self, symbols: &[Symbol]) {
        for &sym in symbols {
            self.update(sym);
        }
    }

    /// Append symbols to the history without touching the tree.
    pub fn update_history(&mut self, symbols: &[Symbol]) {
        self.history.extend_from_slice(symbols);
    }

    /// Undo the most recent `update`, releasing any child left with no data.
    pub fn revert(&mut self) {
        let Some(sym) = self.history.pop() else {
            return;
        };

        let context = self.context();
        if context.len() < self.depth {
            return;
        }

        let path = self.existing_path(&context);

        for i in (0..path.len()).rev() {
            let id = path[i];
            {
                let node = self.arena.get_mut(id);
                node.counts[sym.index()] -= 1;
                let mul = node.log_kt_mul(sym);
                node.log_pe -= mul;
            }

            // reclaim children that have now seen no data
            for child_sym in [Symbol::Off, Symbol::On] {
                if let Some(child) = self.arena.get(id).child(child_sym) {
                    if self.arena.get(child).visits() == 0 {
                        self.arena.release(child);
                        self.arena.get_mut(id).children[child_sym.index()] = None;
                    }
                }
            }

            self.refresh_weighted(id, i + 1 == path.len());
        }
    }

    /// Shrink the history to a former size without touching the tree.
    pub fn revert_history(&mut self, new_size: usize) {
        debug_assert!(new_size <= self.history.len());
        self.history.truncate(new_size);
    }

    /// The probability of observing `sym` next, given the history.
    ///
    /// With insufficient context the estimate is uniform.
    pub fn predict(&mut self, sym: Symbol) -> f64 {
        if self.history.len() + 1 <= self.depth {
            return 0.5;
        }

        // prob(sym | history) = prob(sym and history) / prob(history)
        let log_prob_history = self.log_block_probability();
        self.update(sym);
        let log_prob_sym_and_history = self.log_block_probability();
        self.revert();

        (log_prob_sym_and_history - log_prob_history).exp()
    }

    /// The probability of observing a whole block next, given the history.
    pub fn predict_block(&mut self, symbols: &[Symbol]) -> f64 {
        if self.history.len() + symbols.len() <= self.depth {
            return 2f64.powi(-(symbols.len() as i32));
        }

        let log_prob_history = self.log_block_probability();
        self.update_block(symbols);
        let log_prob_block_and_history = self.log_block_probability();
        for _ in 0..symbols.len() {
            self.revert();
        }

        (log_prob_block_and_history - log_prob_history).exp()
    }

    /// Draw `count` symbols from the model, committing each one so later
    /// draws condition on earlier ones.
    pub fn gen_random_symbols(&mut self, rng: &mut impl Rng, count: usize) -> SymbolList {
        let mut symbols = SymbolList::with_capacity(count);
        for _ in 0..count {
            let sym = if rng.gen::<f64>() < self.predict(Symbol::Off) {
                Symbol::Off
            } else {
                Symbol::On
            };
            symbols.push(sym);
            self.update(sym);
        }
        symbols
    }

    /// Draw `count` symbols and restore the tree afterwards.
    pub fn gen_random_symbols_no_commit(
        &mut self,
        rng: &mut impl Rng,
        count: usize,
    ) -> SymbolList {
        let symbols = self.gen_random_symbols(rng, count);
        for _ in 0..count {
            self.revert();
        }
        symbols
    }

    /// Drop the history and every node, reinstalling an empty root.
    pub fn clear(&mut self) {
        self.history.clear();
        self.arena.clear();
        self.root = self.arena.alloc();
    }

    pub(crate) fn push_history(&mut self, sym: Symbol) {
        self.history.push(sym);
    }

    pub(crate) fn pop_history(&mut self) -> Option<Symbol> {
        self.history.pop()
    }
}

impl fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTree")
            .field("depth", &self.depth)
            .field("history_size", &self.history.len())
            .field("nodes", &self.size())
            .field("log_pw", &self.log_block_probability())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    fn syms(bits: &str) -> SymbolList {
        bits.chars()
            .map(|c| Symbol::from_bit(c == '1'))
            .collect()
    }

    #[test]
    fn warm_up_updates_touch_history_only() {
        let mut ct = ContextTree::new(3);
        ct.update_block(&syms("101"));
        assert_eq!(ct.history_size(), 3);
        assert_eq!(ct.size(), 1); // just the root
        assert_eq!(ct.log_block_probability(), 0.0);
    }

    #[test]
    fn update_grows_the_context_path() {
        let mut ct = ContextTree::new(2);
        ct.update_block(&syms("0011"));
        // each past-warm-up update materialises at most depth new nodes
        assert!(ct.size() > 1);
        assert!(ct.log_block_probability() < 0.0);
    }

    #[test]
    fn revert_restores_a_fresh_tree() {
        let mut ct = ContextTree::new(3);
        let stream = syms("110100101101001");
        ct.update_block(&stream);
        for _ in 0..stream.len() {
            ct.revert();
        }

        let fresh = ContextTree::new(3);
        assert_eq!(ct.history_size(), 0);
        assert_eq!(ct.size(), fresh.size());
        assert!(approx_eq(ct.log_block_probability(), 0.0, 1e-9));
        assert_eq!(ct.most_frequent_sym(), Symbol::Off);
    }

    #[test]
    fn revert_restores_intermediate_state() {
        let mut ct = ContextTree::new(2);
        ct.update_block(&syms("010011"));
        let size = ct.size();
        let log_pw = ct.log_block_probability();

        ct.update(Symbol::On);
        ct.update(Symbol::Off);
        ct.revert();
        ct.revert();

        assert_eq!(ct.size(), size);
        assert!(approx_eq(ct.log_block_probability(), log_pw, 1e-9));
    }

    #[test]
    fn predict_is_uniform_without_context() {
        let mut ct = ContextTree::new(4);
        assert_eq!(ct.predict(Symbol::On), 0.5);
        ct.update(Symbol::On);
        assert_eq!(ct.predict(Symbol::Off), 0.5);
    }

    #[test]
    fn predict_sums_to_one() {
        let mut ct = ContextTree::new(3);
        ct.update_block(&syms("1011010010"));
        let total = ct.predict(Symbol::Off) + ct.predict(Symbol::On);
        assert!(approx_eq(total, 1.0, 1e-9), "total = {total}");
    }

    #[test]
    fn predict_matches_committed_ratio() {
        let prefix = syms("110010110");
        let mut committed = ContextTree::new(3);
        committed.update_block(&prefix);
        let log_before = committed.log_block_probability();
        committed.update(Symbol::On);
        let log_after = committed.log_block_probability();

        let mut fresh = ContextTree::new(3);
        fresh.update_block(&prefix);
        let p = fresh.predict(Symbol::On);

        assert!(approx_eq(p, (log_after - log_before).exp(), 1e-9));
    }

    #[test]
    fn predict_block_short_history_is_uniform() {
        let mut ct = ContextTree::new(8);
        assert!(approx_eq(ct.predict_block(&syms("101")), 0.125, 1e-12));
    }

    #[test]
    fn a_constant_stream_becomes_predictable() {
        let mut ct = ContextTree::new(3);
        for _ in 0..40 {
            ct.update(Symbol::On);
        }
        assert!(ct.predict(Symbol::On) > 0.9);
        assert_eq!(ct.most_frequent_sym(), Symbol::On);
    }

    #[test]
    fn gen_random_symbols_no_commit_restores_state() {
        let mut ct = ContextTree::new(3);
        ct.update_block(&syms("1101001011"));
        let size = ct.size();
        let history_size = ct.history_size();
        let log_pw = ct.log_block_probability();

        let mut rng = StdRng::seed_from_u64(7);
        let drawn = ct.gen_random_symbols_no_commit(&mut rng, 5);

        assert_eq!(drawn.len(), 5);
        assert_eq!(ct.size(), size);
        assert_eq!(ct.history_size(), history_size);
        assert!(approx_eq(ct.log_block_probability(), log_pw, 1e-9));
    }

    #[test]
    fn history_symbols_are_addressable_oldest_first() {
        let mut ct = ContextTree::new(3);
        ct.update_block(&syms("101"));
        assert_eq!(ct.nth_history_symbol(0), Some(Symbol::On));
        assert_eq!(ct.nth_history_symbol(1), Some(Symbol::Off));
        assert_eq!(ct.nth_history_symbol(2), Some(Symbol::On));
        assert_eq!(ct.nth_history_symbol(3), None);
    }

    #[test]
    fn clear_resets_everything() {
        let mut ct = ContextTree::new(3);
        ct.update_block(&syms("11010010"));
        ct.clear();
        assert_eq!(ct.history_size(), 0);
        assert_eq!(ct.size(), 1);
        assert_eq!(ct.predict(Symbol::On), 0.5);
    }

    #[test]
    fn context_fn_overrides_the_default_context() {
        // a hook that ignores the history and always supplies the all-Off context
        let mut ct = ContextTree::new(2);
        ct.set_context_fn(Some(Arc::new(
            |_history: &[Symbol], depth: usize, out: &mut Vec<Symbol>| {
                out.extend(std::iter::repeat(Symbol::Off).take(depth));
            },
        )));

        ct.update_block(&syms("1111"));
        // all updates land under the same context path: root + 2 nodes
        assert_eq!(ct.size(), 3);
    }

    #[test]
    fn depth_zero_tree_is_a_kt_estimator() {
        let mut ct = ContextTree::new(0);
        ct.update(Symbol::On);
        // KT after one On: P(On) = 1.5/2
        assert!(approx_eq(ct.predict(Symbol::On), 0.75, 1e-12));
    }
}
