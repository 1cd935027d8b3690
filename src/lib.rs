#![allow(clippy::needless_return, clippy::redundant_field_names)]

//! Exact Clebsch-Gordan coefficients and Wigner 3j, 6j and 9j symbols.
//!
//! Every coefficient is computed in exact arithmetic over prime-exponent
//! vectors: a rational is stored as the vector of exponents of its prime
//! factorization, so multiplication, division, gcd and square-free splitting
//! are elementwise on small integers. Only the single alternating sum at the
//! heart of each symbol touches big-integer arithmetic, and it does so after
//! the exact common factor of all terms has been divided out. The result is
//! returned either as an `f64` or as an exact [`SqrtRational`], the form
//! `(sn/sd) * sqrt(rn/rd)` every such coefficient takes.
//!
//! All angular momentum arguments are doubled (`dj = 2j`, `dm = 2m`) so that
//! half-integer momenta are ordinary integers.
//!
//! Two tiers are provided:
//!
//! - module-level functions ([`clebsch_gordan`], [`wigner_3j`], ...) backed by
//!   a fixed-size table shared behind a lock, with an LRU cache on the 3j
//!   entry point; they serve doubled-j triples summing to at most 270 with no
//!   setup,
//! - a [`Wigner`] context sized at construction for any doubled-j ceiling,
//!   which adds the 6j, 9j and Racah symbols.

use thiserror::Error;

mod checks;
mod fixed;
mod pf;
mod primes;
mod sqrt_rational;
mod wigner;

pub use self::fixed::{
    binomial, clear_wigner_3j_cache, clebsch_gordan, clebsch_gordan_array,
    clebsch_gordan_exact, wigner_3j, wigner_3j_exact, FIXED_NMAX,
};
pub use self::sqrt_rational::SqrtRational;
pub use self::wigner::Wigner;

/// Errors reported by the validated entry points. The evaluator hot paths
/// treat range violations as programming errors and panic instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("binomial ({n}, {k}) outside the table (largest row {nmax})")]
    BinomialOutOfRange { n: i32, k: i32, nmax: i32 },
}
