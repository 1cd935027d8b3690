//! Prime tables backing the two prime-exponent representations.
//!
//! The bounded tier works with a fixed table of the first 32 primes, enough to
//! factorize every integer up to 136. The unbounded tier sieves all primes
//! below a runtime ceiling chosen at context construction.

/// The first 32 primes. Position `i` of a bounded exponent vector refers to
/// `PRIMES32[i]`; 131 is the largest prime below 136, so every integer in
/// `1..=136` factorizes over this table.
pub(crate) const PRIMES32: [u32; 32] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131,
];

/// Sieve of Eratosthenes, returning every prime `<= limit` in ascending order.
pub(crate) fn sieve(limit: usize) -> Vec<u16> {
    assert!(
        limit <= u16::MAX as usize,
        "sieve limit {} exceeds the u16 prime range",
        limit
    );
    if limit < 2 {
        return Vec::new();
    }
    let mut composite = vec![false; limit + 1];
    let mut primes = Vec::new();
    for p in 2..=limit {
        if composite[p] {
            continue;
        }
        primes.push(p as u16);
        let mut m = p * p;
        while m <= limit {
            composite[m] = true;
            m += p;
        }
    }
    return primes;
}

/// Number of primes in `primes` that are `<= n`, i.e. the logical size of a
/// prime-exponent vector able to hold the factorization of any integer `<= n`.
pub(crate) fn upper_bound(primes: &[u16], n: u16) -> usize {
    return primes.partition_point(|&p| p <= n);
}
