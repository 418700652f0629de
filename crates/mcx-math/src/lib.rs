//! Numerically stable log-domain math for the mcx model.
//!
//! All probability arithmetic in the predictor runs in natural-log space;
//! this crate holds the shared primitives: the context-tree weighting
//! combiner with its overflow guard, log-add-exp, and the precomputed
//! Krichevski-Trofimov update-multiplier table.

pub mod kt;
pub mod logspace;

pub use kt::log_kt_multiplier;
pub use logspace::{ctw_mix, log_add_exp, log_one_plus_exp};
