//! Log-domain combining primitives.

use std::f64::consts::LN_2;

/// Above this, `log(1 + e^x)` is indistinguishable from `x` in f64 and the
/// exponential would overflow.
const LOG1P_EXP_GUARD: f64 = 100.0;

/// Stable `log(1 + e^x)`.
pub fn log_one_plus_exp(x: f64) -> f64 {
    if x >= LOG1P_EXP_GUARD {
        x
    } else {
        x.exp().ln_1p()
    }
}

/// Stable `log(e^a + e^b)`.
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::NAN;
    }
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    let diff = (a - b).abs();
    m + (-diff).exp().ln_1p()
}

/// The context-tree weighting combiner at an internal node:
/// `log(0.5 * (P_e + P_w0 * P_w1))` given `log_pe` and the sum of the
/// children's log weighted probabilities (an absent child contributes 0).
pub fn ctw_mix(log_pe: f64, log_pw_children: f64) -> f64 {
    -LN_2 + log_pe + log_one_plus_exp(log_pw_children - log_pe)
}
