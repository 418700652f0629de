//! Krichevski-Trofimov update multipliers.
//!
//! The KT estimator assigns the next symbol `s` probability
//! `(n_s + 0.5) / (visits + 1)`. The log multiplier is added to a node's
//! `log_pe` on update and subtracted on revert, so it must be computed
//! identically in both directions. The low-count region is precomputed
//! once behind a one-shot lock; the table is shared by every tree in the
//! process.

use std::sync::OnceLock;

const KT_CACHE_DIM: usize = 256;

static LOG_KT_CACHE: OnceLock<Vec<f64>> = OnceLock::new();

fn cache() -> &'static [f64] {
    LOG_KT_CACHE.get_or_init(|| {
        let mut table = vec![0.0; KT_CACHE_DIM * KT_CACHE_DIM];
        for sym_count in 0..KT_CACHE_DIM {
            for visits in 0..KT_CACHE_DIM {
                table[sym_count * KT_CACHE_DIM + visits] =
                    ((sym_count as f64 + 0.5) / (visits as f64 + 1.0)).ln();
            }
        }
        table
    })
}

/// `log((sym_count + 0.5) / (visits + 1))`, the KT update multiplier for a
/// symbol seen `sym_count` times in a context visited `visits` times.
pub fn log_kt_multiplier(sym_count: u32, visits: u32) -> f64 {
    let (i, j) = (sym_count as usize, visits as usize);
    if i < KT_CACHE_DIM && j < KT_CACHE_DIM {
        return cache()[i * KT_CACHE_DIM + j];
    }
    ((sym_count as f64 + 0.5) / (visits as f64 + 1.0)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn first_symbol_is_a_fair_coin() {
        assert!(approx_eq(log_kt_multiplier(0, 0), 0.5f64.ln(), 1e-12));
    }

    #[test]
    fn known_values() {
        // after one Off: P(Off) = 1.5/2, P(On) = 0.5/2
        assert!(approx_eq(log_kt_multiplier(1, 1), (1.5f64 / 2.0).ln(), 1e-12));
        assert!(approx_eq(log_kt_multiplier(0, 1), (0.5f64 / 2.0).ln(), 1e-12));
        // after two Off: P(Off) = 2.5/3
        assert!(approx_eq(log_kt_multiplier(2, 2), (2.5f64 / 3.0).ln(), 1e-12));
    }

    #[test]
    fn multipliers_sum_to_one() {
        for visits in 0..50u32 {
            for a in 0..=visits {
                let b = visits - a;
                let p = log_kt_multiplier(a, visits).exp() + log_kt_multiplier(b, visits).exp();
                assert!(approx_eq(p, 1.0, 1e-12), "a={a} b={b}");
            }
        }
    }

    #[test]
    fn cache_agrees_with_direct_formula() {
        // spot-check around the cache boundary
        for &(i, j) in &[(0u32, 0u32), (17, 200), (255, 255), (256, 10), (10, 256), (1000, 4000)] {
            let direct = ((i as f64 + 0.5) / (j as f64 + 1.0)).ln();
            assert!(
                approx_eq(log_kt_multiplier(i, j), direct, 1e-15),
                "mismatch at ({i}, {j})"
            );
        }
    }
}
