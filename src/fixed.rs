//! Bounded evaluator tier.
//!
//! Rationals are 32 signed 8-bit prime exponents ([`Fr136`]), wide enough to
//! factorize every integer up to 136; the whole binomial table for
//! `0 <= k <= n <= 136` is built once behind a process-wide guard and all
//! arithmetic stays in `i128` until the final assembly. This tier needs no
//! configuration but is only defined for `dj1 + dj2 + dj3 <= 270`
//! (equivalently `J + 1 <= 136`); anything larger belongs to [`crate::Wigner`].
//!
//! The elementwise operators are written as plain lane loops over the fixed
//! array; they must stay bit-identical to the scalar unbounded path, the fixed
//! width is purely a performance tier.

use std::num::NonZeroUsize;

use lru::LruCache;
use num_bigint::BigInt;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::checks::{check_couple, check_jm, iphase, is_odd};
use crate::primes::PRIMES32;
use crate::sqrt_rational::SqrtRational;
use crate::Error;

const PN: usize = 32;

/// Largest `n` of a cached binomial, and so the largest `J + 1` the bounded
/// Clebsch-Gordan evaluator supports.
pub const FIXED_NMAX: i32 = 136;

// cache up to that many wigner_3j symbols in a LRU cache. 200_000 entries is
// enough to hold every symbol up to j ~ 20
const WIGNER_3J_CACHE_SIZE: usize = 200_000;

type Wigner3jCacheKey = (i32, i32, i32, i32, i32, i32);
lazy_static::lazy_static!(
    static ref WIGNER: FixedWigner = FixedWigner::new();

    static ref CACHED_WIGNER_3J: Mutex<LruCache<Wigner3jCacheKey, f64>> = Mutex::new(
        LruCache::new(NonZeroUsize::new(WIGNER_3J_CACHE_SIZE).expect("cache size is zero"))
    );
);

/// Remove all cached 3j values.
pub fn clear_wigner_3j_cache() {
    CACHED_WIGNER_3J.lock().clear();
}

/// A rational number as the first 32 prime exponents, stored in `i8` lanes.
/// Exponents outside the `i8` range are a violated precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fr136([i8; PN]);

impl Fr136 {
    pub(crate) fn one() -> Fr136 {
        return Fr136([0; PN]);
    }

    /// gcd: elementwise minimum, valid for true integers.
    pub(crate) fn gcd(self, other: Fr136) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = self.0[i].min(other.0[i]);
        }
        return Fr136(c);
    }

    /// lcm: elementwise maximum, dual of gcd.
    pub(crate) fn lcm(self, other: Fr136) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = self.0[i].max(other.0[i]);
        }
        return Fr136(c);
    }

    /// Signed gcd: per lane, both positive take the minimum, both negative
    /// take the maximum, otherwise zero.
    pub(crate) fn sgcd(self, other: Fr136) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            let tmin = self.0[i].min(other.0[i]);
            let tmax = self.0[i].max(other.0[i]);
            if tmin > 0 {
                c[i] = tmin;
            } else if tmax < 0 {
                c[i] = tmax;
            }
        }
        return Fr136(c);
    }

    pub(crate) fn square(self) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = self.0[i] * 2;
        }
        return Fr136(c);
    }

    pub(crate) fn inv(self) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = -self.0[i];
        }
        return Fr136(c);
    }

    /// Split `self = s^2 * r`: truncating division per lane, so a negative
    /// odd exponent leaves a remainder of -1. The sign of the final assembly
    /// depends on that convention.
    pub(crate) fn square_free_split(self) -> (Fr136, Fr136) {
        let mut s = [0; PN];
        let mut r = [0; PN];
        for i in 0..PN {
            s[i] = self.0[i] / 2;
            r[i] = self.0[i] % 2;
        }
        return (Fr136(s), Fr136(r));
    }
}

impl std::ops::Mul for Fr136 {
    type Output = Fr136;
    fn mul(self, rhs: Fr136) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = self.0[i] + rhs.0[i];
        }
        return Fr136(c);
    }
}

impl std::ops::Div for Fr136 {
    type Output = Fr136;
    fn div(self, rhs: Fr136) -> Fr136 {
        let mut c = [0; PN];
        for i in 0..PN {
            c[i] = self.0[i] - rhs.0[i];
        }
        return Fr136(c);
    }
}

/// Move every tracked prime factor of `n` into `f`, leaving the residual in
/// `n`. Stops as soon as the remaining magnitude is 0 or 1.
pub(crate) fn extract_to(f: &mut Fr136, n: &mut i128) {
    if *n >= -1 && *n <= 1 {
        return;
    }
    for i in 0..PN {
        let p = PRIMES32[i] as i128;
        while *n % p == 0 {
            f.0[i] += 1;
            *n /= p;
        }
        if *n >= -1 && *n <= 1 {
            return;
        }
    }
}

/// Factorize a plain integer over the 32-prime table. The caller keeps the
/// mutated residual.
pub(crate) fn extract(n: &mut i128) -> Fr136 {
    let mut f = Fr136::one();
    extract_to(&mut f, n);
    return f;
}

fn binomial_data_size(n: usize) -> usize {
    let x = n / 2 + 1;
    return x * (x + (n & 1));
}

fn binomial_index(n: usize, k: usize) -> usize {
    let x = n / 2 + 1;
    return x * (x - (1 - (n & 1))) + k;
}

struct FixedWigner {
    // exact C(n, k) for 0 <= k <= n/2 <= 68, triangular layout
    binomials: Vec<Fr136>,
    // integers[m] is the factorization of m, 1 <= m <= 136
    integers: Vec<Fr136>,
    // pows[i][k] = PRIMES32[i]^(k+1), as far as it fits in i128
    pows: Vec<Vec<u128>>,
}

impl FixedWigner {
    fn new() -> FixedWigner {
        let mut integers = vec![Fr136::one(); FIXED_NMAX as usize + 1];
        for (m, r) in integers.iter_mut().enumerate().skip(1) {
            let mut n = m as i128;
            *r = extract(&mut n);
            debug_assert_eq!(n, 1);
        }

        let mut binomials = vec![Fr136::one(); binomial_data_size(FIXED_NMAX as usize)];
        for n in 0..=FIXED_NMAX as usize {
            let mut r = Fr136::one();
            for k in 0..=n / 2 {
                // C(n, k) = C(n, k - 1) * (n - k + 1) / k
                if k > 0 {
                    r = r * integers[n - k + 1] / integers[k];
                }
                binomials[binomial_index(n, k)] = r;
            }
        }

        let pows = PRIMES32
            .iter()
            .map(|&p| {
                let mut table = vec![p as u128];
                loop {
                    match table.last().unwrap().checked_mul(p as u128) {
                        Some(next) if next <= i128::MAX as u128 => table.push(next),
                        _ => break,
                    }
                }
                table
            })
            .collect();

        return FixedWigner {
            binomials,
            integers,
            pows,
        };
    }

    /// Unchecked cached lookup of C(n, k). Out-of-range arguments are a
    /// violated precondition and panic.
    fn unsafe_binomial(&self, n: i32, k: i32) -> Fr136 {
        let k = k.min(n - k);
        return self.binomials[binomial_index(n as usize, k as usize)];
    }

    fn numerator(&self, r: &Fr136) -> i128 {
        let mut n: i128 = 1;
        for i in 0..PN {
            if r.0[i] > 0 {
                n *= self.pows[i][r.0[i] as usize - 1] as i128;
            }
        }
        return n;
    }

    fn denominator(&self, r: &Fr136) -> i128 {
        let mut d: i128 = 1;
        for i in 0..PN {
            if r.0[i] < 0 {
                d *= self.pows[i][(-r.0[i]) as usize - 1] as i128;
            }
        }
        return d;
    }

    fn num_den(&self, r: &Fr136) -> (i128, i128) {
        return (self.numerator(r), self.denominator(r));
    }

    /// Alternating sum of `terms` after dividing out their exact common
    /// factor. Returns the integer sum and the extracted factor.
    fn stagger_sum(&self, terms: &[Fr136]) -> (i128, Fr136) {
        let mut cf = terms[0];
        for t in &terms[1..] {
            cf = cf.gcd(*t);
        }
        let mut sum: i128 = 0;
        let mut sign: i128 = 1;
        for t in terms {
            sum += sign * self.numerator(&(*t / cf));
            sign = -sign;
        }
        return (sum, cf);
    }

    /// The twelve-step reduction shared by the double and exact entry points.
    /// `None` encodes the defined zero results (selection rules, vanishing
    /// alternating sum).
    fn cg_core(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dm1: i32,
        dm2: i32,
        dm3: i32,
    ) -> Option<(Fr136, Fr136, i128, i32)> {
        if !(check_jm(dj1, dm1) && check_jm(dj2, dm2) && check_jm(dj3, dm3)) {
            return None;
        }
        if !check_couple(dj1, dj2, dj3) || dm1 + dm2 != dm3 {
            return None;
        }
        let j = (dj1 + dj2 + dj3) / 2;
        let jm1 = j - dj1;
        let jm2 = j - dj2;
        let jm3 = j - dj3;
        let j1mm1 = (dj1 - dm1) / 2;
        let j2mm2 = (dj2 - dm2) / 2;
        let j3mm3 = (dj3 - dm3) / 2;
        let j2pm2 = (dj2 + dm2) / 2;

        let low = 0.max(j1mm1 - jm2).max(j2pm2 - jm1);
        let high = jm3.min(j1mm1).min(j2pm2);
        let mut terms = Vec::with_capacity((high - low + 1) as usize);
        for z in low..=high {
            terms.push(
                self.unsafe_binomial(jm3, z)
                    * self.unsafe_binomial(jm2, j1mm1 - z)
                    * self.unsafe_binomial(jm1, j2pm2 - z),
            );
        }
        let (mut b, mut cf) = self.stagger_sum(&terms);
        if b == 0 {
            return None;
        }
        extract_to(&mut cf, &mut b);

        let a = (self.unsafe_binomial(dj1, jm2) * self.unsafe_binomial(dj2, jm3))
            / (self.unsafe_binomial(j + 1, jm3)
                * self.unsafe_binomial(dj1, j1mm1)
                * self.unsafe_binomial(dj2, j2mm2)
                * self.unsafe_binomial(dj3, j3mm3));

        let (s, r) = a.square_free_split();
        let s = s * cf;

        let g = r.inv().sgcd(s);
        let s = s / g;
        let r = r * g.square();
        return Some((s, r, b, low));
    }

    fn cg(&self, dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> f64 {
        let (s, r, b, low) = match self.cg_core(dj1, dj2, dj3, dm1, dm2, dm3) {
            Some(parts) => parts,
            None => return 0.0,
        };
        let (sn, sd) = self.num_den(&s);
        let (rn, rd) = self.num_den(&r);
        return iphase(low) as f64 * (sn as f64) * (b as f64) / (sd as f64)
            * f64::sqrt(rn as f64 / rd as f64);
    }

    fn cg_exact(&self, dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> SqrtRational {
        let (s, r, b, low) = match self.cg_core(dj1, dj2, dj3, dm1, dm2, dm3) {
            Some(parts) => parts,
            None => return SqrtRational::zero(),
        };
        let (sn, sd) = self.num_den(&s);
        let (rn, rd) = self.num_den(&r);
        let mut sn = BigInt::from(sn) * BigInt::from(b);
        if is_odd(low) {
            sn = -sn;
        }
        return SqrtRational {
            sn,
            sd: BigInt::from(sd),
            rn: BigInt::from(rn),
            rd: BigInt::from(rd),
        };
    }
}

/// Exact binomial coefficient from the bounded cache, validated.
pub fn binomial(n: i32, k: i32) -> Result<BigInt, Error> {
    if n < 0 || k < 0 || k > n || n > FIXED_NMAX {
        return Err(Error::BinomialOutOfRange {
            n,
            k,
            nmax: FIXED_NMAX,
        });
    }
    return Ok(BigInt::from(WIGNER.numerator(&WIGNER.unsafe_binomial(n, k))));
}

/// Clebsch-Gordan coefficient `<j1 m1 ; j2 m2 | j3 m3>` with doubled
/// arguments, as a double.
///
/// Defined for `dj1 + dj2 + dj3 <= 270`; larger arguments exceed the bounded
/// binomial table and panic.
pub fn clebsch_gordan(dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> f64 {
    return WIGNER.cg(dj1, dj2, dj3, dm1, dm2, dm3);
}

/// Exact form of [`clebsch_gordan`].
pub fn clebsch_gordan_exact(
    dj1: i32,
    dj2: i32,
    dj3: i32,
    dm1: i32,
    dm2: i32,
    dm3: i32,
) -> SqrtRational {
    return WIGNER.cg_exact(dj1, dj2, dj3, dm1, dm2, dm3);
}

/// Wigner 3j symbol with doubled arguments, as a double. Same range limit as
/// [`clebsch_gordan`]. Results are memoized in a process-wide LRU cache.
pub fn wigner_3j(dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> f64 {
    let key = (dj1, dj2, dj3, dm1, dm2, dm3);
    {
        let mut cache = CACHED_WIGNER_3J.lock();
        if let Some(&cached) = cache.get(&key) {
            return cached;
        }
    }

    let result = iphase((dj3 + dm3) / 2 + dj1) as f64 / f64::sqrt((dj3 + 1) as f64)
        * WIGNER.cg(dj1, dj2, dj3, -dm1, -dm2, dm3);

    CACHED_WIGNER_3J.lock().put(key, result);
    return result;
}

/// Exact form of [`wigner_3j`].
pub fn wigner_3j_exact(dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> SqrtRational {
    let mut ans = WIGNER.cg_exact(dj1, dj2, dj3, -dm1, -dm2, dm3);
    if is_odd((dj3 + dm3) / 2 + dj1) {
        ans.sn = -ans.sn;
    }
    ans.rd *= dj3 + 1;
    return ans;
}

/// Compute the full array of Clebsch-Gordan coefficients for the three given
/// doubled `j`.
///
/// Data will be written to `output`, which can be interpreted as a row-major
/// 3-dimensional array with shape `(dj1 + 1, dj2 + 1, dj3 + 1)`, the last
/// axis running over `dm3 = -dj3, -dj3 + 2, ..., dj3`.
pub fn clebsch_gordan_array(dj1: i32, dj2: i32, dj3: i32, output: &mut [f64]) {
    let j2_size = (dj2 + 1) as usize;
    let j3_size = (dj3 + 1) as usize;

    let size = (dj1 + 1) as usize * j2_size * j3_size;
    if output.len() != size {
        panic!(
            "invalid output size, expected to have space for {} entries, but got {}",
            size,
            output.len()
        );
    }

    output.par_iter_mut().enumerate().for_each(|(i, o)| {
        let dm1 = 2 * ((i / j3_size) / j2_size) as i32 - dj1;
        let dm2 = 2 * ((i / j3_size) % j2_size) as i32 - dj2;
        let dm3 = 2 * (i % j3_size) as i32 - dj3;

        *o = clebsch_gordan(dj1, dj2, dj3, dm1, dm2, dm3);
    })
}
