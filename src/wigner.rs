//! Unbounded evaluator tier.
//!
//! A [`Wigner`] context owns a prime sieve and the packed factorizations of
//! every integer up to a ceiling derived from the largest doubled-j it has to
//! serve. Binomial coefficients are assembled on demand from the integer
//! table by the product recurrence, entirely in prime-exponent arithmetic;
//! nothing is converted to a big integer until a staggered sum or the final
//! assembly needs one. Unlike the bounded tier there is no global state: the
//! context is built once with [`Wigner::new`] and shared by reference, and
//! its tables are dropped with it.

use num_bigint::BigInt;
use num_traits::Zero;

use crate::checks::{check_couple, check_jm, is_odd};
use crate::pf::{self, PfTable, TermBuf};
use crate::primes::{sieve, upper_bound};
use crate::sqrt_rational::SqrtRational;
use crate::Error;

/// Evaluator context for doubled-j up to the `max_two_j` given at
/// construction, for every symbol up to the 9j.
pub struct Wigner {
    nmax: usize,
    primes: Vec<u16>,
    integers: PfTable,
}

/// One 6j symbol held back in prime-exponent parts: the value is
/// `b * s * sqrt(r)` with the phase already folded into `b`. Used to compose
/// the 9j sum without leaving exact arithmetic.
struct SixJParts {
    s: Vec<i16>,
    r: Vec<i16>,
    b: BigInt,
}

impl Wigner {
    /// Build the integer table and sieve for symbols with every doubled-j
    /// `<= max_two_j`. The ceiling is sized for the 9j worst case, so one
    /// context serves CG, 3j, 6j and 9j alike.
    pub fn new(max_two_j: i32) -> Wigner {
        assert!(max_two_j >= 0, "max_two_j must be nonnegative");
        // the largest binomial row reached by the 9j recursion is
        // 5 * jmax + 1, i.e. 5/2 of the doubled ceiling
        let nmax = 5 * max_two_j as usize / 2 + 2;
        let primes = sieve(nmax);
        let integers = PfTable::build(nmax, &primes);
        log::debug!(
            "wigner context for max_two_j = {}: {} integers over {} primes",
            max_two_j,
            integers.len(),
            primes.len()
        );
        return Wigner {
            nmax,
            primes,
            integers,
        };
    }

    /// Largest binomial row `n` this context can serve.
    pub fn nmax(&self) -> usize {
        return self.nmax;
    }

    fn width(&self, n: usize) -> usize {
        assert!(
            n <= u16::MAX as usize,
            "prime ceiling {} exceeds the sieve range",
            n
        );
        return upper_bound(&self.primes, n as u16);
    }

    /// `r = C(n, k)` by the product recurrence over the integer table.
    /// Out-of-range arguments are a violated precondition and panic; the
    /// validated entry point is [`Wigner::binomial`].
    fn binomial_into(&self, r: &mut [i16], n: i32, k: i32) {
        assert!(
            n >= 0 && n as usize <= self.nmax,
            "binomial row {} outside the context ceiling {}",
            n,
            self.nmax
        );
        assert!((0..=n).contains(&k), "binomial ({}, {}) is undefined", n, k);
        pf::set_one(r);
        let k = k.min(n - k);
        for i in 0..k {
            pf::mul(r, self.integers.get((n - i) as usize));
            pf::div(r, self.integers.get((i + 1) as usize));
        }
    }

    /// Exact binomial coefficient, validated against the context range.
    pub fn binomial(&self, n: i32, k: i32) -> Result<BigInt, Error> {
        if n < 0 || k < 0 || k > n || n as usize > self.nmax {
            return Err(Error::BinomialOutOfRange {
                n,
                k,
                nmax: self.nmax as i32,
            });
        }
        let mut r = vec![0i16; self.width(n as usize)];
        self.binomial_into(&mut r, n, k);
        return Ok(pf::numerator(&self.primes, &r));
    }

    /// Alternating sum of the packed terms after dividing out their exact
    /// common factor, which is left in `cf`. The first term enters with a
    /// positive sign. Extracting the common factor first is what keeps the
    /// big-integer residues small while the raw terms span dozens of orders
    /// of magnitude.
    fn stagger_sum(&self, cf: &mut [i16], terms: &mut TermBuf) -> BigInt {
        pf::copy_from(cf, terms.row(0));
        for i in 1..terms.count() {
            pf::gcd(cf, terms.row(i));
        }
        let mut sum = BigInt::zero();
        for i in 0..terms.count() {
            let row = terms.row_mut(i);
            pf::div(row, cf);
            let t = pf::numerator(&self.primes, row);
            if i % 2 == 0 {
                sum += t;
            } else {
                sum -= t;
            }
        }
        return sum;
    }

    /// Exact Clebsch-Gordan coefficient `<j1 m1 ; j2 m2 | j3 m3>`, doubled
    /// arguments.
    pub fn cg_exact(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dm1: i32,
        dm2: i32,
        dm3: i32,
    ) -> SqrtRational {
        if !(check_jm(dj1, dm1) && check_jm(dj2, dm2) && check_jm(dj3, dm3)) {
            return SqrtRational::zero();
        }
        if !check_couple(dj1, dj2, dj3) || dm1 + dm2 != dm3 {
            return SqrtRational::zero();
        }
        let j = (dj1 + dj2 + dj3) / 2;
        let jm1 = j - dj1;
        let jm2 = j - dj2;
        let jm3 = j - dj3;
        let j1mm1 = (dj1 - dm1) / 2;
        let j2mm2 = (dj2 - dm2) / 2;
        let j3mm3 = (dj3 - dm3) / 2;
        let j2pm2 = (dj2 + dm2) / 2;

        let width = self.width((j + 1) as usize);
        let mut t = vec![0i16; width];

        let low = 0.max(j1mm1 - jm2).max(j2pm2 - jm1);
        let high = jm3.min(j1mm1).min(j2pm2);
        let mut bs = TermBuf::new(width, (high - low + 1) as usize);
        for (i, z) in (low..=high).enumerate() {
            self.binomial_into(&mut t, jm3, z);
            pf::copy_from(bs.row_mut(i), &t);
            self.binomial_into(&mut t, jm2, j1mm1 - z);
            pf::mul(bs.row_mut(i), &t);
            self.binomial_into(&mut t, jm1, j2pm2 - z);
            pf::mul(bs.row_mut(i), &t);
        }
        let mut cf = vec![0i16; width];
        let mut b = self.stagger_sum(&mut cf, &mut bs);
        if b.is_zero() {
            return SqrtRational::zero();
        }

        let mut a = vec![0i16; width];
        self.binomial_into(&mut a, dj1, jm2);
        self.binomial_into(&mut t, dj2, jm3);
        pf::mul(&mut a, &t);
        self.binomial_into(&mut t, j + 1, jm3);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj1, j1mm1);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj2, j2mm2);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj3, j3mm3);
        pf::div(&mut a, &t);

        pf::extract_to(&self.primes, &mut cf, &mut b);
        let mut s = vec![0i16; width];
        let mut r = vec![0i16; width];
        pf::square_free_split(&mut s, &mut r, &a);
        pf::mul(&mut s, &cf);

        pf::copy_from(&mut t, &r);
        pf::inv(&mut t);
        pf::sgcd(&mut t, &s);
        pf::div(&mut s, &t);
        pf::mul(&mut r, &t);
        pf::mul(&mut r, &t);

        let (mut sn, sd) = pf::num_den(&self.primes, &s);
        let (rn, rd) = pf::num_den(&self.primes, &r);
        sn *= &b;
        if is_odd(low) {
            sn = -sn;
        }
        return SqrtRational { sn, sd, rn, rd };
    }

    /// Clebsch-Gordan coefficient as a double.
    pub fn cg(&self, dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> f64 {
        return self.cg_exact(dj1, dj2, dj3, dm1, dm2, dm3).to_f64();
    }

    /// Exact Wigner 3j symbol, doubled arguments.
    pub fn wigner_3j_exact(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dm1: i32,
        dm2: i32,
        dm3: i32,
    ) -> SqrtRational {
        let mut ans = self.cg_exact(dj1, dj2, dj3, -dm1, -dm2, dm3);
        if is_odd((dj3 + dm3) / 2 + dj1) {
            ans.sn = -ans.sn;
        }
        ans.rd *= dj3 + 1;
        return ans;
    }

    /// Wigner 3j symbol as a double.
    pub fn wigner_3j(&self, dj1: i32, dj2: i32, dj3: i32, dm1: i32, dm2: i32, dm3: i32) -> f64 {
        return self.wigner_3j_exact(dj1, dj2, dj3, dm1, dm2, dm3).to_f64();
    }

    /// The 6j reduction, stopping short of the big-integer reconstruction.
    /// `None` covers both defined zeros: failed selection rules and a
    /// vanishing alternating sum.
    fn six_j_parts(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dj4: i32,
        dj5: i32,
        dj6: i32,
    ) -> Option<SixJParts> {
        if !(check_couple(dj1, dj2, dj3)
            && check_couple(dj1, dj5, dj6)
            && check_couple(dj4, dj2, dj6)
            && check_couple(dj4, dj5, dj3))
        {
            return None;
        }
        let j123 = (dj1 + dj2 + dj3) / 2;
        let j156 = (dj1 + dj5 + dj6) / 2;
        let j426 = (dj4 + dj2 + dj6) / 2;
        let j453 = (dj4 + dj5 + dj3) / 2;
        let jpm123 = (dj1 + dj2 - dj3) / 2;
        let jpm132 = (dj1 + dj3 - dj2) / 2;
        let jpm231 = (dj2 + dj3 - dj1) / 2;
        let jpm156 = (dj1 + dj5 - dj6) / 2;
        let jpm426 = (dj4 + dj2 - dj6) / 2;
        let jpm453 = (dj4 + dj5 - dj3) / 2;

        let low = j123.max(j156).max(j426).max(j453);
        let high = (jpm123 + j453).min(jpm132 + j426).min(jpm231 + j156);
        let max_j = (high + 1).max(jpm123).max(jpm132).max(jpm231);
        let width = self.width(max_j as usize);
        let mut t = vec![0i16; width];

        let mut bs = TermBuf::new(width, (high - low + 1) as usize);
        for (i, x) in (low..=high).enumerate() {
            self.binomial_into(&mut t, x + 1, j123 + 1);
            pf::copy_from(bs.row_mut(i), &t);
            self.binomial_into(&mut t, jpm123, x - j453);
            pf::mul(bs.row_mut(i), &t);
            self.binomial_into(&mut t, jpm132, x - j426);
            pf::mul(bs.row_mut(i), &t);
            self.binomial_into(&mut t, jpm231, x - j156);
            pf::mul(bs.row_mut(i), &t);
        }
        let mut cf = vec![0i16; width];
        let mut b = self.stagger_sum(&mut cf, &mut bs);
        if b.is_zero() {
            return None;
        }
        pf::extract_to(&self.primes, &mut cf, &mut b);

        let mut a = vec![0i16; width];
        self.binomial_into(&mut a, j123 + 1, dj1 + 1);
        self.binomial_into(&mut t, dj1, jpm123);
        pf::mul(&mut a, &t);
        self.binomial_into(&mut t, j156 + 1, dj1 + 1);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj1, jpm156);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, j453 + 1, dj4 + 1);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj4, jpm453);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, j426 + 1, dj4 + 1);
        pf::div(&mut a, &t);
        self.binomial_into(&mut t, dj4, jpm426);
        pf::div(&mut a, &t);

        let mut s = vec![0i16; width];
        let mut r = vec![0i16; width];
        pf::square_free_split(&mut s, &mut r, &a);
        pf::mul(&mut s, &cf);
        pf::div(&mut s, self.integers.get((dj4 + 1) as usize));

        pf::copy_from(&mut t, &r);
        pf::inv(&mut t);
        pf::sgcd(&mut t, &s);
        pf::div(&mut s, &t);
        pf::mul(&mut r, &t);
        pf::mul(&mut r, &t);

        if is_odd(low) {
            b = -b;
        }
        return Some(SixJParts { s, r, b });
    }

    /// Exact Wigner 6j symbol, doubled arguments.
    pub fn wigner_6j_exact(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dj4: i32,
        dj5: i32,
        dj6: i32,
    ) -> SqrtRational {
        let parts = match self.six_j_parts(dj1, dj2, dj3, dj4, dj5, dj6) {
            Some(parts) => parts,
            None => return SqrtRational::zero(),
        };
        let (mut sn, sd) = pf::num_den(&self.primes, &parts.s);
        let (rn, rd) = pf::num_den(&self.primes, &parts.r);
        sn *= &parts.b;
        return SqrtRational { sn, sd, rn, rd };
    }

    /// Wigner 6j symbol as a double.
    pub fn wigner_6j(&self, dj1: i32, dj2: i32, dj3: i32, dj4: i32, dj5: i32, dj6: i32) -> f64 {
        return self.wigner_6j_exact(dj1, dj2, dj3, dj4, dj5, dj6).to_f64();
    }

    /// Exact Racah coefficient `W(j1 j2 j3 j4; j5 j6)`, a phase-relabeled 6j.
    pub fn racah_exact(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dj4: i32,
        dj5: i32,
        dj6: i32,
    ) -> SqrtRational {
        let mut ans = self.wigner_6j_exact(dj1, dj2, dj5, dj4, dj3, dj6);
        if is_odd((dj1 + dj2 + dj3 + dj4) / 2) {
            ans.sn = -ans.sn;
        }
        return ans;
    }

    /// Racah coefficient as a double.
    pub fn racah(&self, dj1: i32, dj2: i32, dj3: i32, dj4: i32, dj5: i32, dj6: i32) -> f64 {
        return self.racah_exact(dj1, dj2, dj3, dj4, dj5, dj6).to_f64();
    }

    /// Exact Wigner 9j symbol, doubled arguments.
    ///
    /// Composed from the 6j machinery over the internal coupling index `t`:
    /// each term `(2t+1) {j1 j4 j7; j8 j9 t} {j2 j5 j8; j4 t j6}
    /// {j3 j6 j9; t j1 j2}` is combined in prime-exponent parts, the square
    /// factors of its square-root argument are folded back into the rational
    /// part, and the rational parts then run through the same
    /// common-factor-first summation as every other staggered sum.
    pub fn wigner_9j_exact(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dj4: i32,
        dj5: i32,
        dj6: i32,
        dj7: i32,
        dj8: i32,
        dj9: i32,
    ) -> SqrtRational {
        if !(check_couple(dj1, dj2, dj3)
            && check_couple(dj4, dj5, dj6)
            && check_couple(dj7, dj8, dj9)
            && check_couple(dj1, dj4, dj7)
            && check_couple(dj2, dj5, dj8)
            && check_couple(dj3, dj6, dj9))
        {
            return SqrtRational::zero();
        }
        let dtl = (dj1 - dj9)
            .abs()
            .max((dj2 - dj6).abs())
            .max((dj4 - dj8).abs());
        let dth = (dj1 + dj9).min(dj2 + dj6).min(dj4 + dj8);
        if dtl > dth {
            return SqrtRational::zero();
        }

        let mut terms: Vec<(Vec<i16>, BigInt)> = Vec::with_capacity(((dth - dtl) / 2 + 1) as usize);
        let mut rr_common: Vec<i16> = Vec::new();
        for dt in (dtl..=dth).step_by(2) {
            let pa = self.six_j_parts(dj1, dj4, dj7, dj8, dj9, dt);
            let pb = self.six_j_parts(dj2, dj5, dj8, dj4, dt, dj6);
            let pc = self.six_j_parts(dj3, dj6, dj9, dt, dj1, dj2);
            let (pa, pb, pc) = match (pa, pb, pc) {
                (Some(pa), Some(pb), Some(pc)) => (pa, pb, pc),
                _ => continue,
            };
            let tfac = self.integers.get((dt + 1) as usize);
            let width = pa
                .s
                .len()
                .max(pa.r.len())
                .max(pb.s.len())
                .max(pb.r.len())
                .max(pc.s.len())
                .max(pc.r.len())
                .max(tfac.len());

            let mut s = vec![0i16; width];
            pf::mul(&mut s, &pa.s);
            pf::mul(&mut s, &pb.s);
            pf::mul(&mut s, &pc.s);
            pf::mul(&mut s, tfac);

            let mut rprod = vec![0i16; width];
            pf::mul(&mut rprod, &pa.r);
            pf::mul(&mut rprod, &pb.r);
            pf::mul(&mut rprod, &pc.r);
            let mut rs = vec![0i16; width];
            let mut rr = vec![0i16; width];
            pf::square_free_split(&mut rs, &mut rr, &rprod);
            pf::mul(&mut s, &rs);
            // normalize the square-free part to a positive integer so that
            // every term shares the same square-root argument
            for i in 0..width {
                if rr[i] < 0 {
                    rr[i] = 1;
                    s[i] -= 1;
                }
            }
            if rr.len() > rr_common.len() {
                debug_assert!(rr[..rr_common.len()] == rr_common[..] || terms.is_empty());
                rr_common = rr;
            } else {
                debug_assert_eq!(rr[..], rr_common[..rr.len()]);
            }
            terms.push((s, pa.b * pb.b * pc.b));
        }
        if terms.is_empty() {
            return SqrtRational::zero();
        }

        let width = terms
            .iter()
            .map(|(s, _)| s.len())
            .max()
            .unwrap_or(0)
            .max(rr_common.len());
        for (s, _) in terms.iter_mut() {
            s.resize(width, 0);
        }
        rr_common.resize(width, 0);

        let mut cf = terms[0].0.clone();
        for (s, _) in &terms[1..] {
            pf::gcd(&mut cf, s);
        }
        let mut total = BigInt::zero();
        for (s, b) in terms.iter_mut() {
            pf::div(s, &cf);
            debug_assert!(s.iter().all(|&e| e >= 0));
            total += pf::numerator(&self.primes, s) * &*b;
        }
        if total.is_zero() {
            return SqrtRational::zero();
        }

        pf::extract_to(&self.primes, &mut cf, &mut total);
        let mut s = cf;
        let mut r = rr_common;
        let mut g = vec![0i16; width];
        pf::copy_from(&mut g, &r);
        pf::inv(&mut g);
        pf::sgcd(&mut g, &s);
        pf::div(&mut s, &g);
        pf::mul(&mut r, &g);
        pf::mul(&mut r, &g);

        let (mut sn, sd) = pf::num_den(&self.primes, &s);
        let (rn, rd) = pf::num_den(&self.primes, &r);
        sn *= &total;
        if is_odd(dtl) {
            sn = -sn;
        }
        return SqrtRational { sn, sd, rn, rd };
    }

    /// Wigner 9j symbol as a double.
    #[allow(clippy::too_many_arguments)]
    pub fn wigner_9j(
        &self,
        dj1: i32,
        dj2: i32,
        dj3: i32,
        dj4: i32,
        dj5: i32,
        dj6: i32,
        dj7: i32,
        dj8: i32,
        dj9: i32,
    ) -> f64 {
        return self
            .wigner_9j_exact(dj1, dj2, dj3, dj4, dj5, dj6, dj7, dj8, dj9)
            .to_f64();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::iphase;
    use approx::{assert_abs_diff_eq, assert_ulps_eq};

    #[test]
    fn test_binomial() {
        let w = Wigner::new(20);
        assert_eq!(w.binomial(0, 0).unwrap(), BigInt::from(1));
        assert_eq!(w.binomial(10, 4).unwrap(), BigInt::from(210));
        assert_eq!(w.binomial(50, 25).unwrap(), BigInt::from(126410606437752u64));
        assert!(w.binomial(w.nmax() as i32 + 1, 2).is_err());
        assert!(w.binomial(5, 6).is_err());
        assert!(w.binomial(-1, 0).is_err());
    }

    #[test]
    fn test_all_zero_j() {
        // every coupling over j = 0 exists and is exactly 1; the factor
        // tables degenerate to the empty factorization here
        let w = Wigner::new(0);
        assert_ulps_eq!(w.cg(0, 0, 0, 0, 0, 0), 1.0);
        assert_ulps_eq!(w.wigner_3j(0, 0, 0, 0, 0, 0), 1.0);
        assert_ulps_eq!(w.wigner_6j(0, 0, 0, 0, 0, 0), 1.0);
        assert_ulps_eq!(w.wigner_9j(0, 0, 0, 0, 0, 0, 0, 0, 0), 1.0);

        let x = w.cg_exact(0, 0, 0, 0, 0, 0);
        assert_eq!(x.sn, BigInt::from(1));
        assert_eq!(x.sd, BigInt::from(1));
        assert_eq!(x.rn, BigInt::from(1));
        assert_eq!(x.rd, BigInt::from(1));
    }

    #[test]
    fn test_clebsch_gordan() {
        let w = Wigner::new(12);
        assert_ulps_eq!(w.cg(4, 12, 8, 0, 0, 2), 0.0);
        assert_ulps_eq!(w.cg(2, 2, 4, 2, 2, 4), 1.0);
        assert_ulps_eq!(w.cg(4, 2, 6, 4, -2, 2), f64::sqrt(1.0 / 15.0));
        assert_ulps_eq!(w.cg(2, 1, 3, 2, -1, 1), f64::sqrt(3.0) / 3.0);
    }

    #[test]
    fn test_cg_exact_form() {
        let w = Wigner::new(6);
        // <1 0 ; 1 0 | 0 0> = -1/sqrt(3)
        let x = w.cg_exact(2, 2, 0, 0, 0, 0);
        assert_eq!(x.sn, BigInt::from(-1));
        assert_eq!(x.sd, BigInt::from(1));
        assert_eq!(x.rn, BigInt::from(1));
        assert_eq!(x.rd, BigInt::from(3));
    }

    #[test]
    fn test_wigner_3j_small() {
        let w = Wigner::new(12);
        assert_ulps_eq!(w.wigner_3j(4, 12, 8, 0, 0, 0), f64::sqrt(715.0) / 143.0);
        assert_ulps_eq!(w.wigner_3j(10, 6, 4, -6, 6, 0), f64::sqrt(330.0) / 165.0);
        assert_ulps_eq!(w.wigner_3j(10, 6, 4, -4, 6, -2), -f64::sqrt(330.0) / 330.0);
        assert_ulps_eq!(w.wigner_3j(2, 2, 0, 0, 0, 0), -1.0 / f64::sqrt(3.0));
        assert_ulps_eq!(w.wigner_3j(2, 2, 4, 0, 0, 0), f64::sqrt(2.0 / 15.0));
        assert_ulps_eq!(w.wigner_3j(2, 6, 4, 0, 0, 1), 0.0);
    }

    #[test]
    fn test_wigner_3j_large() {
        // doubled-j in the hundreds, pinned against wigxjpf/sympy
        let w = Wigner::new(600);
        assert_ulps_eq!(
            w.wigner_3j(200, 200, 200, 200, -200, 0),
            2.689688852311291e-13,
            max_ulps = 8
        );
        assert_ulps_eq!(
            w.wigner_3j(100, 100, 100, 100, -100, 0),
            1.8219272830228477e-7,
            max_ulps = 8
        );
        assert_ulps_eq!(
            w.wigner_3j(200, 600, 570, 4, -4, 0),
            0.001979165708981953,
            max_ulps = 8
        );
        assert_ulps_eq!(
            w.wigner_3j(101, 300, 285, 1, -2, 1),
            -0.0028951194712330303,
            max_ulps = 8
        );
        assert_ulps_eq!(w.wigner_3j(100, 300, 285, 2, -2, 0), 0.0);
    }

    #[test]
    fn test_matches_bounded_tier() {
        let w = Wigner::new(8);
        for dj1 in 0i32..=6 {
            for dj2 in 0i32..=6 {
                for dj3 in ((dj1 - dj2).abs()..=(dj1 + dj2).min(8)).step_by(2) {
                    for dm1 in (-dj1..=dj1).step_by(2) {
                        for dm2 in (-dj2..=dj2).step_by(2) {
                            let dm3 = dm1 + dm2;
                            if dm3.abs() > dj3 {
                                continue;
                            }
                            let exact = w.cg_exact(dj1, dj2, dj3, dm1, dm2, dm3);
                            let fixed =
                                crate::fixed::clebsch_gordan_exact(dj1, dj2, dj3, dm1, dm2, dm3);
                            assert_eq!(exact, fixed);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_wigner_6j() {
        let w = Wigner::new(40);
        // {1/2 1/2 1; 1/2 1/2 1} = 1/6
        assert_ulps_eq!(w.wigner_6j(1, 1, 2, 1, 1, 2), 1.0 / 6.0);
        // {1 1 1; 1 1 1} = 1/6
        assert_ulps_eq!(w.wigner_6j(2, 2, 2, 2, 2, 2), 1.0 / 6.0);
        // {2 2 2; 2 2 2} = -3/70
        assert_ulps_eq!(w.wigner_6j(4, 4, 4, 4, 4, 4), -3.0 / 70.0);
        // {a b c; 0 c b} = (-1)^(a+b+c) / sqrt((2b+1)(2c+1)), here a=b=c=20
        assert_ulps_eq!(w.wigner_6j(40, 40, 40, 0, 40, 40), 1.0 / 41.0, max_ulps = 8);
        // triangle violation is a defined zero
        assert_ulps_eq!(w.wigner_6j(2, 2, 8, 2, 2, 2), 0.0);
    }

    #[test]
    fn test_wigner_6j_exact_form() {
        let w = Wigner::new(4);
        let x = w.wigner_6j_exact(2, 2, 2, 2, 2, 2);
        assert_eq!(x.sn, BigInt::from(1));
        assert_eq!(x.sd, BigInt::from(6));
        assert_eq!(x.rn, BigInt::from(1));
        assert_eq!(x.rd, BigInt::from(1));
    }

    #[test]
    fn test_wigner_6j_zero_column_identity() {
        let w = Wigner::new(30);
        for &(dja, djb, djc) in &[(4, 6, 8), (10, 10, 10), (20, 14, 10), (3, 5, 6)] {
            let lhs = w.wigner_6j(dja, djb, djc, 0, djc, djb);
            let rhs = iphase((dja + djb + djc) / 2) as f64
                / f64::sqrt(((djb + 1) * (djc + 1)) as f64);
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wigner_6j_orthogonality() {
        // sum over x of (2x+1) {a b x; c d p} {a b x; c d q}
        //   = delta_pq / (2p+1)
        let w = Wigner::new(40);
        let (dja, djb, djc, djd) = (10, 14, 12, 16);
        for djp in (4..=12).step_by(2) {
            for djq in (4..=12).step_by(2) {
                if !(check_couple(dja, djd, djp)
                    && check_couple(djb, djc, djp)
                    && check_couple(dja, djd, djq)
                    && check_couple(djb, djc, djq))
                {
                    continue;
                }
                let xl = (dja - djb).abs().max((djc - djd).abs());
                let xh = (dja + djb).min(djc + djd);
                let mut sum = 0.0;
                for dx in (xl..=xh).step_by(2) {
                    sum += (dx + 1) as f64
                        * w.wigner_6j(dja, djb, dx, djc, djd, djp)
                        * w.wigner_6j(dja, djb, dx, djc, djd, djq);
                }
                let expected = if djp == djq {
                    1.0 / (djp + 1) as f64
                } else {
                    0.0
                };
                assert_abs_diff_eq!(sum, expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_racah() {
        let w = Wigner::new(8);
        // W(j1 j2 j3 j4; j5 j6) = (-1)^(j1+j2+j3+j4) {j1 j2 j5; j4 j3 j6}
        assert_ulps_eq!(
            w.racah(2, 2, 2, 2, 2, 2),
            iphase(4) as f64 * w.wigner_6j(2, 2, 2, 2, 2, 2)
        );
        assert_ulps_eq!(
            w.racah(1, 1, 1, 1, 2, 2),
            iphase(2) as f64 * w.wigner_6j(1, 1, 2, 1, 1, 2)
        );
    }

    #[test]
    fn test_wigner_9j() {
        let w = Wigner::new(12);
        // {1/2 1/2 1; 1/2 1/2 1; 1 1 0} = -1/18
        assert_ulps_eq!(w.wigner_9j(1, 1, 2, 1, 1, 2, 2, 2, 0), -1.0 / 18.0);
        // selection-rule zeros
        assert_ulps_eq!(w.wigner_9j(2, 2, 8, 2, 2, 2, 2, 2, 2), 0.0);
        assert_ulps_eq!(w.wigner_9j(1, 1, 2, 1, 1, 2, 2, 2, 1), 0.0);
    }

    #[test]
    fn test_wigner_9j_exact_form() {
        let w = Wigner::new(4);
        let x = w.wigner_9j_exact(1, 1, 2, 1, 1, 2, 2, 2, 0);
        assert_eq!(x.sn, BigInt::from(-1));
        assert_eq!(x.sd, BigInt::from(18));
        assert_eq!(x.rn, BigInt::from(1));
        assert_eq!(x.rd, BigInt::from(1));
    }

    #[test]
    fn test_wigner_9j_zero_column_reduction() {
        // {a b c; d e c; g g 0}
        //   = (-1)^(b+c+d+g) / sqrt((2c+1)(2g+1)) * {a b c; e d g}
        let w = Wigner::new(16);
        let samples = [
            (2, 4, 4, 4, 2, 2),
            (2, 2, 4, 2, 2, 2),
            (6, 4, 6, 4, 6, 2),
            (3, 3, 6, 3, 3, 4),
        ];
        for &(dja, djb, djc, djd, dje, djg) in &samples {
            let lhs = w.wigner_9j(dja, djb, djc, djd, dje, djc, djg, djg, 0);
            let rhs = iphase((djb + djc + djd + djg) / 2) as f64
                / f64::sqrt(((djc + 1) * (djg + 1)) as f64)
                * w.wigner_6j(dja, djb, djc, dje, djd, djg);
            assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_wigner_9j_matches_6j_sum() {
        // the defining contraction over the internal coupling index,
        // evaluated in floating point from the 6j symbols
        let w = Wigner::new(20);
        let samples: [(i32, i32, i32, i32, i32, i32, i32, i32, i32); 5] = [
            (2, 2, 2, 2, 2, 2, 2, 2, 2),
            (2, 2, 4, 2, 2, 4, 4, 4, 4),
            (4, 4, 4, 4, 4, 4, 4, 4, 4),
            (6, 4, 2, 4, 4, 4, 2, 4, 6),
            (3, 3, 4, 3, 3, 4, 4, 4, 8),
        ];
        for &(dj1, dj2, dj3, dj4, dj5, dj6, dj7, dj8, dj9) in &samples {
            let dtl = (dj1 - dj9)
                .abs()
                .max((dj2 - dj6).abs())
                .max((dj4 - dj8).abs());
            let dth = (dj1 + dj9).min(dj2 + dj6).min(dj4 + dj8);
            let mut sum = 0.0;
            for dt in (dtl..=dth).step_by(2) {
                sum += iphase(dt) as f64
                    * (dt + 1) as f64
                    * w.wigner_6j(dj1, dj4, dj7, dj8, dj9, dt)
                    * w.wigner_6j(dj2, dj5, dj8, dj4, dt, dj6)
                    * w.wigner_6j(dj3, dj6, dj9, dt, dj1, dj2);
            }
            assert_abs_diff_eq!(
                w.wigner_9j(dj1, dj2, dj3, dj4, dj5, dj6, dj7, dj8, dj9),
                sum,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_wigner_9j_large() {
        // doubled-j in the tens to hundreds: the exact path must stay finite
        // and agree with the 6j contraction
        let w = Wigner::new(60);
        let (dj1, dj2, dj3, dj4, dj5, dj6, dj7, dj8, dj9) =
            (40, 40, 40, 40, 40, 40, 40, 40, 40);
        let dtl = 0;
        let dth = 80;
        let mut sum = 0.0;
        for dt in (dtl..=dth).step_by(2) {
            sum += iphase(dt) as f64
                * (dt + 1) as f64
                * w.wigner_6j(dj1, dj4, dj7, dj8, dj9, dt)
                * w.wigner_6j(dj2, dj5, dj8, dj4, dt, dj6)
                * w.wigner_6j(dj3, dj6, dj9, dt, dj1, dj2);
        }
        let value = w.wigner_9j(dj1, dj2, dj3, dj4, dj5, dj6, dj7, dj8, dj9);
        assert!(value.is_finite());
        assert_abs_diff_eq!(value, sum, epsilon = 1e-9);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_panics() {
        let w = Wigner::new(4);
        // J + 1 exceeds the context ceiling on the unchecked path
        let _ = w.cg(40, 40, 40, 0, 0, 0);
    }

    #[test]
    #[should_panic]
    fn test_oversized_context_panics() {
        // the integer table would need primes beyond the u16 sieve
        let _ = Wigner::new(26214);
    }
}
