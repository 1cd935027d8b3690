use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// An exact evaluator result of the form `(sn/sd) * sqrt(rn/rd)`.
///
/// `rn/rd` is kept square-free-reduced relative to `sn/sd`: any rational
/// factor shared between the prefactor and the reciprocal of the square-root
/// argument has already been cancelled. The sign lives in `sn`; a vanishing
/// coefficient is represented as `sn = 0` with all other parts equal to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqrtRational {
    pub sn: BigInt,
    pub sd: BigInt,
    pub rn: BigInt,
    pub rd: BigInt,
}

impl SqrtRational {
    /// The exact zero coefficient.
    pub fn zero() -> SqrtRational {
        return SqrtRational {
            sn: BigInt::zero(),
            sd: BigInt::one(),
            rn: BigInt::one(),
            rd: BigInt::one(),
        };
    }

    pub fn is_zero(&self) -> bool {
        return self.sn.is_zero();
    }

    /// Collapse to double precision. Large intermediate integers saturate the
    /// conversion; results stay accurate as long as the separate parts fit in
    /// the `f64` exponent range (doubled-j well into the hundreds).
    pub fn to_f64(&self) -> f64 {
        let s = big_to_f64(&self.sn) / big_to_f64(&self.sd);
        let r = big_to_f64(&self.rn) / big_to_f64(&self.rd);
        return s * r.sqrt();
    }
}

impl std::fmt::Display for SqrtRational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "{}/{}√({}/{})", self.sn, self.sd, self.rn, self.rd);
    }
}

pub(crate) fn big_to_f64(x: &BigInt) -> f64 {
    return x.to_f64().unwrap_or_else(|| {
        if x.is_negative() {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_ulps_eq;

    #[test]
    fn test_zero() {
        let z = SqrtRational::zero();
        assert!(z.is_zero());
        assert_eq!(z.to_f64(), 0.0);
    }

    #[test]
    fn test_to_f64() {
        // -1/1 * sqrt(1/3) = -0.5773...
        let x = SqrtRational {
            sn: BigInt::from(-1),
            sd: BigInt::from(1),
            rn: BigInt::from(1),
            rd: BigInt::from(3),
        };
        assert_ulps_eq!(x.to_f64(), -1.0 / f64::sqrt(3.0));
    }

    #[test]
    fn test_display() {
        let x = SqrtRational {
            sn: BigInt::from(2),
            sd: BigInt::from(3),
            rn: BigInt::from(5),
            rd: BigInt::from(7),
        };
        assert_eq!(x.to_string(), "2/3√(5/7)");
    }
}
