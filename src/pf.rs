//! Unbounded prime-exponent vectors.
//!
//! A rational number is a slice of signed 16-bit exponents, position `i`
//! bound to the `i`-th prime of the context's sieve. Trailing zero exponents
//! are insignificant; the all-zero slice is the number one. Binary operations
//! take the shorter operand on the right and treat its missing tail as zeros.
//!
//! Factorizations of whole integer ranges are packed back-to-back in a single
//! buffer ([`PfTable`]); per-call scratch terms share one uniform-width buffer
//! ([`TermBuf`]). Both exist so that the staggered sums of the evaluator touch
//! contiguous memory instead of one allocation per term.

use num_bigint::BigInt;
use num_traits::{One, Pow, Signed, Zero};

use crate::primes::upper_bound;

/// Reset to the number one.
pub(crate) fn set_one(r: &mut [i16]) {
    r.fill(0);
}

/// `r *= a`, i.e. elementwise `r[i] += a[i]`. Requires `a.len() <= r.len()`.
pub(crate) fn mul(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    for (x, y) in r.iter_mut().zip(a.iter()) {
        *x += y;
    }
}

/// `r /= a`, i.e. elementwise `r[i] -= a[i]`. Requires `a.len() <= r.len()`.
pub(crate) fn div(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    for (x, y) in r.iter_mut().zip(a.iter()) {
        *x -= y;
    }
}

/// `r = r^n`, elementwise scale.
pub(crate) fn pow_assign(r: &mut [i16], n: i16) {
    for x in r.iter_mut() {
        *x *= n;
    }
}

/// `r = r^2`.
pub(crate) fn square(r: &mut [i16]) {
    pow_assign(r, 2);
}

/// `r = 1/r`, elementwise negation.
pub(crate) fn inv(r: &mut [i16]) {
    for x in r.iter_mut() {
        *x = -*x;
    }
}

/// `r = a` with the tail of `r` zeroed. Requires `a.len() <= r.len()`.
pub(crate) fn copy_from(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    r[..a.len()].copy_from_slice(a);
    r[a.len()..].fill(0);
}

/// `r = gcd(r, a)`: elementwise minimum. Only meaningful when both operands
/// are true integers (no negative exponents); the missing tail of `a` counts
/// as zero. Requires `a.len() <= r.len()`.
pub(crate) fn gcd(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    for (x, y) in r.iter_mut().zip(a.iter()) {
        *x = (*x).min(*y);
    }
    for x in r[a.len()..].iter_mut() {
        *x = (*x).min(0);
    }
}

/// `r = lcm(r, a)`: elementwise maximum, dual of [`gcd`].
pub(crate) fn lcm(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    for (x, y) in r.iter_mut().zip(a.iter()) {
        *x = (*x).max(*y);
    }
    for x in r[a.len()..].iter_mut() {
        *x = (*x).max(0);
    }
}

/// Signed gcd, `r = sgcd(r, a)`. Per prime: both exponents positive take the
/// minimum (shared numerator power), both negative take the maximum (shared
/// denominator power), otherwise zero. Extracts the factor common to a
/// numerator-heavy and a denominator-heavy quantity. Requires
/// `a.len() <= r.len()`.
pub(crate) fn sgcd(r: &mut [i16], a: &[i16]) {
    debug_assert!(a.len() <= r.len());
    for (x, y) in r.iter_mut().zip(a.iter()) {
        let tmin = (*x).min(*y);
        let tmax = (*x).max(*y);
        if tmin > 0 {
            *x = tmin;
        } else if tmax < 0 {
            *x = tmax;
        } else {
            *x = 0;
        }
    }
    r[a.len()..].fill(0);
}

/// Square/square-free split, `x = s^2 * r`: per exponent `e`, `s.e = e / 2`
/// and `r.e = e % 2` with truncating division, so a negative odd exponent
/// leaves a remainder of -1. That convention carries the sign bookkeeping of
/// the final assembly and must not be changed to euclidean division.
/// Requires `s.len() >= x.len()` and `r.len() >= x.len()`.
pub(crate) fn square_free_split(s: &mut [i16], r: &mut [i16], x: &[i16]) {
    debug_assert!(s.len() >= x.len() && r.len() >= x.len());
    s[x.len()..].fill(0);
    r[x.len()..].fill(0);
    for (i, &e) in x.iter().enumerate() {
        s[i] = e / 2;
        r[i] = e % 2;
    }
}

/// Reconstruct the numerator of `r`: the product of `primes[i]^r[i]` over
/// positive exponents.
pub(crate) fn numerator(primes: &[u16], r: &[i16]) -> BigInt {
    let mut n = BigInt::one();
    for (i, &e) in r.iter().enumerate() {
        if e > 0 {
            n *= Pow::pow(BigInt::from(primes[i]), e as u32);
        }
    }
    return n;
}

/// Reconstruct the denominator of `r`: the product of `primes[i]^-r[i]` over
/// negative exponents.
pub(crate) fn denominator(primes: &[u16], r: &[i16]) -> BigInt {
    let mut d = BigInt::one();
    for (i, &e) in r.iter().enumerate() {
        if e < 0 {
            d *= Pow::pow(BigInt::from(primes[i]), (-e) as u32);
        }
    }
    return d;
}

/// Reconstruct numerator and denominator together.
pub(crate) fn num_den(primes: &[u16], r: &[i16]) -> (BigInt, BigInt) {
    return (numerator(primes, r), denominator(primes, r));
}

/// Move every tracked prime factor of `n` into `f`, leaving in `n` the exact
/// residual whose prime factors all exceed `primes[f.len() - 1]`. Stops as
/// soon as the remaining magnitude is 0 or 1.
pub(crate) fn extract_to(primes: &[u16], f: &mut [i16], n: &mut BigInt) {
    for (i, x) in f.iter_mut().enumerate() {
        if n.abs() <= BigInt::one() {
            return;
        }
        let p = BigInt::from(primes[i]);
        while (&*n % &p).is_zero() {
            *n /= &p;
            *x += 1;
        }
    }
}

/// Factorizations of the integers `1..=n`, packed back-to-back in one buffer.
///
/// Record `m` spans exactly as many positions as the factorization of `m`
/// needs, so the layout has no uniform stride; an offset index replaces the
/// pointer-bump walk of a packed arena.
pub(crate) struct PfTable {
    data: Vec<i16>,
    index: Vec<u32>,
}

impl PfTable {
    /// Factorize `1..=n` over `primes`. Requires `primes` to contain every
    /// prime `<= n`.
    pub(crate) fn build(n: usize, primes: &[u16]) -> PfTable {
        let width = upper_bound(primes, n as u16);
        let mut scratch = vec![0i16; width];
        let mut data = Vec::new();
        let mut index = Vec::with_capacity(n + 1);
        index.push(0u32);
        for m in 1..=n {
            scratch.fill(0);
            let mut t = m;
            let mut size = 0;
            while t > 1 {
                let p = primes[size] as usize;
                while t % p == 0 {
                    t /= p;
                    scratch[size] += 1;
                }
                size += 1;
            }
            data.extend_from_slice(&scratch[..size]);
            index.push(data.len() as u32);
        }
        return PfTable { data, index };
    }

    /// Number of integers stored.
    pub(crate) fn len(&self) -> usize {
        return self.index.len() - 1;
    }

    /// The factorization of the integer `m`, `1 <= m <= len()`.
    pub(crate) fn get(&self, m: usize) -> &[i16] {
        let lo = self.index[m - 1] as usize;
        let hi = self.index[m] as usize;
        return &self.data[lo..hi];
    }
}

/// A batch of same-width prime-exponent vectors in one contiguous buffer,
/// used for the term list of a staggered sum.
pub(crate) struct TermBuf {
    width: usize,
    count: usize,
    data: Vec<i16>,
}

impl TermBuf {
    pub(crate) fn new(width: usize, count: usize) -> TermBuf {
        return TermBuf {
            width,
            count,
            data: vec![0; width * count],
        };
    }

    // stored explicitly: the width is 0 when every factorization in play is
    // that of 1, and the rows are all empty
    pub(crate) fn count(&self) -> usize {
        return self.count;
    }

    pub(crate) fn row(&self, i: usize) -> &[i16] {
        return &self.data[i * self.width..(i + 1) * self.width];
    }

    pub(crate) fn row_mut(&mut self, i: usize) -> &mut [i16] {
        return &mut self.data[i * self.width..(i + 1) * self.width];
    }
}
