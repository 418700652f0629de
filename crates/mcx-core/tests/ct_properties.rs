//! Property-based tests for the context-tree predictor invariants.

use mcx_common::Symbol;
use mcx_core::predict::{ContextTree, FactoredContextTree};
use proptest::prelude::*;

fn symbol_stream(max_len: usize) -> impl Strategy<Value = Vec<Symbol>> {
    prop::collection::vec(prop::bool::ANY.prop_map(Symbol::from_bit), 0..max_len)
}

fn block(width: usize) -> impl Strategy<Value = Vec<Symbol>> {
    prop::collection::vec(prop::bool::ANY.prop_map(Symbol::from_bit), width)
}

proptest! {
    /// Updating then fully reverting any stream yields a tree
    /// indistinguishable from a fresh one.
    #[test]
    fn full_revert_restores_a_fresh_tree(
        depth in 0usize..5,
        stream in symbol_stream(48),
    ) {
        let mut ct = ContextTree::new(depth);
        for &sym in &stream {
            ct.update(sym);
        }
        for _ in 0..stream.len() {
            ct.revert();
        }

        let fresh = ContextTree::new(depth);
        prop_assert_eq!(ct.history_size(), 0);
        prop_assert_eq!(ct.size(), fresh.size());
        prop_assert!(ct.log_block_probability().abs() <= 1e-9);
        prop_assert_eq!(ct.most_frequent_sym(), Symbol::Off);
    }

    /// Reverting back to an intermediate point matches a tree that only
    /// ever saw the prefix.
    #[test]
    fn partial_revert_matches_the_prefix_tree(
        depth in 0usize..4,
        stream in symbol_stream(40),
        cut in 0usize..40,
    ) {
        let cut = cut.min(stream.len());

        let mut full = ContextTree::new(depth);
        for &sym in &stream {
            full.update(sym);
        }
        for _ in cut..stream.len() {
            full.revert();
        }

        let mut prefix = ContextTree::new(depth);
        for &sym in &stream[..cut] {
            prefix.update(sym);
        }

        prop_assert_eq!(full.history_size(), prefix.history_size());
        prop_assert_eq!(full.size(), prefix.size());
        prop_assert!(
            (full.log_block_probability() - prefix.log_block_probability()).abs() <= 1e-9
        );
    }

    /// `predict(s)` equals the ratio of the committed and uncommitted
    /// block probabilities, computed by independent trees.
    #[test]
    fn predict_is_a_conditional(
        prefix in symbol_stream(32),
        on in prop::bool::ANY,
    ) {
        let depth = 3usize;
        prop_assume!(prefix.len() >= depth);
        let sym = Symbol::from_bit(on);

        let mut committed = ContextTree::new(depth);
        for &s in &prefix {
            committed.update(s);
        }
        let log_before = committed.log_block_probability();
        committed.update(sym);
        let log_after = committed.log_block_probability();

        let mut probe = ContextTree::new(depth);
        for &s in &prefix {
            probe.update(s);
        }

        let p = probe.predict(sym);
        prop_assert!((p - (log_after - log_before).exp()).abs() <= 1e-9);
    }

    /// The two single-symbol predictions always form a distribution.
    #[test]
    fn predictions_sum_to_one(
        depth in 0usize..4,
        stream in symbol_stream(32),
    ) {
        let mut ct = ContextTree::new(depth);
        for &sym in &stream {
            ct.update(sym);
        }
        let total = ct.predict(Symbol::Off) + ct.predict(Symbol::On);
        prop_assert!((total - 1.0).abs() <= 1e-9, "total = {}", total);
    }

    /// Prediction itself is a pure query: it leaves the tree unchanged.
    #[test]
    fn predict_does_not_disturb_the_tree(
        stream in symbol_stream(32),
        probe in block(4),
    ) {
        let mut ct = ContextTree::new(3);
        for &sym in &stream {
            ct.update(sym);
        }
        let size = ct.size();
        let history = ct.history_size();
        let log_pw = ct.log_block_probability();

        ct.predict(Symbol::On);
        ct.predict_block(&probe);

        prop_assert_eq!(ct.size(), size);
        prop_assert_eq!(ct.history_size(), history);
        prop_assert!((ct.log_block_probability() - log_pw).abs() <= 1e-9);
    }

    /// The factored predictor decomposes over its factors: its block
    /// probability equals the committed ratio of its summed factor
    /// probabilities.
    #[test]
    fn factored_predict_matches_committed_ratio(
        blocks in prop::collection::vec(block(3), 0..12),
        probe in block(3),
    ) {
        let mut fct = FactoredContextTree::new(3, 2);
        for b in &blocks {
            fct.update(b);
        }

        let mut committed = fct.clone();
        let log_before = committed.log_block_probability();
        committed.update(&probe);
        let log_after = committed.log_block_probability();

        let p = fct.predict(&probe);
        prop_assert!((p - (log_after - log_before).exp()).abs() <= 1e-9);
    }

    /// Factor histories remain identical under any update/revert pattern.
    #[test]
    fn factor_histories_stay_identical(
        blocks in prop::collection::vec(block(2), 1..10),
        reverts in 0usize..4,
    ) {
        let mut fct = FactoredContextTree::new(2, 3);
        for b in &blocks {
            fct.update(b);
        }
        for _ in 0..reverts.min(blocks.len()) {
            fct.revert(1);
            fct.revert(0);
        }

        let expected = fct.factor(0).history_size();
        prop_assert_eq!(fct.factor(1).history_size(), expected);
    }
}
