//! Criterion benchmarks for the model hot paths: tree updates, the
//! update/revert churn the planner leans on, and percept sampling.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mcx_common::Symbol;
use mcx_core::predict::{ContextTree, FactoredContextTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_stream(len: usize, seed: u64) -> Vec<Symbol> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| Symbol::from_bit(rng.gen())).collect()
}

fn bench_ct_update(c: &mut Criterion) {
    let stream = random_stream(512, 1);
    let mut group = c.benchmark_group("ct");

    for depth in [4usize, 8, 16] {
        group.bench_function(format!("update_512/depth{depth}"), |b| {
            b.iter(|| {
                let mut ct = ContextTree::new(depth);
                for &sym in &stream {
                    ct.update(black_box(sym));
                }
                black_box(ct.log_block_probability())
            })
        });
    }

    group.finish();
}

fn bench_ct_update_revert_churn(c: &mut Criterion) {
    // the planner's dominant pattern: speculative update followed by revert
    let mut ct = ContextTree::new(8);
    for &sym in &random_stream(1024, 2) {
        ct.update(sym);
    }

    c.bench_function("ct/update_revert_pair", |b| {
        b.iter(|| {
            ct.update(black_box(Symbol::On));
            ct.revert();
        })
    });
}

fn bench_ct_predict(c: &mut Criterion) {
    let mut ct = ContextTree::new(8);
    for &sym in &random_stream(1024, 3) {
        ct.update(sym);
    }

    c.bench_function("ct/predict", |b| {
        b.iter(|| black_box(ct.predict(black_box(Symbol::Off))))
    });
}

fn bench_fct_percept_sampling(c: &mut Criterion) {
    let mut fct = FactoredContextTree::new(4, 8);
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..256 {
        let block: Vec<Symbol> = (0..4).map(|_| Symbol::from_bit(rng.gen())).collect();
        fct.update(&block);
    }

    c.bench_function("fct/gen_random_symbols", |b| {
        b.iter(|| black_box(fct.gen_random_symbols(&mut rng, 4)))
    });
}

criterion_group!(
    benches,
    bench_ct_update,
    bench_ct_update_revert_churn,
    bench_ct_predict,
    bench_fct_percept_sampling
);
criterion_main!(benches);
