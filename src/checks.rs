//! Parity helpers and angular-momentum selection rules.
//!
//! All quantum numbers are passed doubled (`dj = 2j`, `dm = 2m`) so that
//! half-integer momenta are plain integers. Every predicate here operates on
//! doubled values.

#[inline]
pub(crate) fn is_odd(x: i32) -> bool {
    return x & 1 != 0;
}

#[inline]
pub(crate) fn is_even(x: i32) -> bool {
    return x & 1 == 0;
}

#[inline]
pub(crate) fn same_parity(x: i32, y: i32) -> bool {
    return is_even(x ^ y);
}

/// `(-1)^n`, computed from the parity bit without branching.
#[inline]
pub(crate) fn iphase(x: i32) -> i32 {
    return 1 - ((x & 1) << 1);
}

/// Is `m` a valid projection of `j`? Requires the same parity (both integer or
/// both half-integer) and `|m| <= j`.
#[inline]
pub(crate) fn check_jm(dj: i32, dm: i32) -> bool {
    return same_parity(dj, dm) && dm.abs() <= dj;
}

/// Can three angular momenta couple? Nonnegative, `j1 + j2 + j3` integer, and
/// the triangle inequality `|j1 - j2| <= j3 <= j1 + j2`.
#[inline]
pub(crate) fn check_couple(dj1: i32, dj2: i32, dj3: i32) -> bool {
    return dj1 >= 0
        && dj2 >= 0
        && same_parity(dj1 + dj2, dj3)
        && dj3 <= dj1 + dj2
        && dj3 >= (dj1 - dj2).abs();
}
