//! IEEE-754 helpers implementing the WebAssembly floating-point rules that
//! differ from the host language's defaults: NaN-propagating `min`/`max`
//! with the `-0`/`+0` ordering, and trapping float-to-integer truncation.
//!
//! Plain arithmetic (`+`, `*`, `sqrt`, ...) maps directly onto the host's
//! IEEE-754 operations with round-to-nearest-ties-to-even; any NaN those
//! produce is an arithmetic NaN, which is all WebAssembly requires.

use crate::trap::Trap;

/// The canonical NaN: payload is one in the top mantissa bit only.
pub(crate) const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
pub(crate) const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

pub(crate) fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::from_bits(CANONICAL_NAN_F32);
    }
    if a == 0.0 && b == 0.0 {
        // min(+0, -0) is -0, which bitwise OR selects.
        return f32::from_bits(a.to_bits() | b.to_bits());
    }
    if a < b {
        a
    } else {
        b
    }
}

pub(crate) fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return f32::from_bits(CANONICAL_NAN_F32);
    }
    if a == 0.0 && b == 0.0 {
        // max(+0, -0) is +0, which bitwise AND selects.
        return f32::from_bits(a.to_bits() & b.to_bits());
    }
    if a > b {
        a
    } else {
        b
    }
}

pub(crate) fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::from_bits(CANONICAL_NAN_F64);
    }
    if a == 0.0 && b == 0.0 {
        return f64::from_bits(a.to_bits() | b.to_bits());
    }
    if a < b {
        a
    } else {
        b
    }
}

pub(crate) fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return f64::from_bits(CANONICAL_NAN_F64);
    }
    if a == 0.0 && b == 0.0 {
        return f64::from_bits(a.to_bits() & b.to_bits());
    }
    if a > b {
        a
    } else {
        b
    }
}

// Truncating conversions trap on NaN and on any value whose truncated
// integer falls outside the destination range. All checks go through f64:
// every f32 and every in-range truncated value is exact there, and both
// range endpoints used below are exactly representable.

fn checked_trunc(x: f64, min: f64, max_exclusive: f64) -> Result<f64, Trap> {
    if x.is_nan() {
        return Err(Trap::BadConversionToInteger);
    }
    let t = x.trunc();
    if t < min || t >= max_exclusive {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t)
}

pub(crate) fn i32_trunc_f32_s(x: f32) -> Result<i32, Trap> {
    checked_trunc(f64::from(x), -2_147_483_648.0, 2_147_483_648.0).map(|t| t as i32)
}

pub(crate) fn i32_trunc_f32_u(x: f32) -> Result<u32, Trap> {
    checked_trunc(f64::from(x), 0.0, 4_294_967_296.0).map(|t| t as u32)
}

pub(crate) fn i32_trunc_f64_s(x: f64) -> Result<i32, Trap> {
    checked_trunc(x, -2_147_483_648.0, 2_147_483_648.0).map(|t| t as i32)
}

pub(crate) fn i32_trunc_f64_u(x: f64) -> Result<u32, Trap> {
    checked_trunc(x, 0.0, 4_294_967_296.0).map(|t| t as u32)
}

pub(crate) fn i64_trunc_f32_s(x: f32) -> Result<i64, Trap> {
    checked_trunc(
        f64::from(x),
        -9_223_372_036_854_775_808.0,
        9_223_372_036_854_775_808.0,
    )
    .map(|t| t as i64)
}

pub(crate) fn i64_trunc_f32_u(x: f32) -> Result<u64, Trap> {
    checked_trunc(f64::from(x), 0.0, 18_446_744_073_709_551_616.0).map(|t| t as u64)
}

pub(crate) fn i64_trunc_f64_s(x: f64) -> Result<i64, Trap> {
    checked_trunc(
        x,
        -9_223_372_036_854_775_808.0,
        9_223_372_036_854_775_808.0,
    )
    .map(|t| t as i64)
}

pub(crate) fn i64_trunc_f64_u(x: f64) -> Result<u64, Trap> {
    checked_trunc(x, 0.0, 18_446_744_073_709_551_616.0).map(|t| t as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_propagate_nan() {
        assert_eq!(f32_min(f32::NAN, 1.0).to_bits(), CANONICAL_NAN_F32);
        assert_eq!(f32_max(1.0, f32::NAN).to_bits(), CANONICAL_NAN_F32);
        assert_eq!(f64_min(f64::NAN, f64::NAN).to_bits(), CANONICAL_NAN_F64);
    }

    #[test]
    fn min_max_of_signed_zeros() {
        assert!(f32_min(0.0, -0.0).is_sign_negative());
        assert!(f32_min(-0.0, 0.0).is_sign_negative());
        assert!(f32_max(0.0, -0.0).is_sign_positive());
        assert!(f64_max(-0.0, 0.0).is_sign_positive());
        assert!(f64_min(-0.0, -0.0).is_sign_negative());
    }

    #[test]
    fn min_max_ordinary_ordering() {
        assert_eq!(f32_min(1.0, 2.0), 1.0);
        assert_eq!(f32_max(1.0, 2.0), 2.0);
        assert_eq!(f64_min(-1.5, -2.5), -2.5);
        assert_eq!(f64_max(f64::NEG_INFINITY, 0.0), 0.0);
    }

    #[test]
    fn trunc_in_range() {
        assert_eq!(i32_trunc_f32_s(-1.9), Ok(-1));
        assert_eq!(i32_trunc_f64_s(2_147_483_647.9), Ok(i32::MAX));
        assert_eq!(i32_trunc_f64_u(4_294_967_295.5), Ok(u32::MAX));
        // Negative values above -1 truncate to zero for unsigned targets.
        assert_eq!(i64_trunc_f64_u(-0.9), Ok(0));
        assert_eq!(i64_trunc_f64_s(-9_223_372_036_854_775_808.0), Ok(i64::MIN));
    }

    #[test]
    fn trunc_out_of_range() {
        assert_eq!(i32_trunc_f32_s(2_147_483_648.0), Err(Trap::IntegerOverflow));
        assert_eq!(i32_trunc_f32_u(-1.0), Err(Trap::IntegerOverflow));
        assert_eq!(
            i64_trunc_f64_s(9_223_372_036_854_775_808.0),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(
            i32_trunc_f64_s(f64::INFINITY),
            Err(Trap::IntegerOverflow)
        );
    }

    #[test]
    fn trunc_of_nan() {
        assert_eq!(
            i32_trunc_f32_s(f32::NAN),
            Err(Trap::BadConversionToInteger)
        );
        assert_eq!(
            i64_trunc_f64_u(f64::NAN),
            Err(Trap::BadConversionToInteger)
        );
    }

    #[test]
    fn nearest_is_ties_to_even() {
        // `nearest` maps onto round_ties_even, not libc round.
        assert_eq!(0.5f64.round_ties_even(), 0.0);
        assert_eq!(1.5f64.round_ties_even(), 2.0);
        assert_eq!(2.5f64.round_ties_even(), 2.0);
        assert_eq!((-0.5f32).round_ties_even().to_bits(), (-0.0f32).to_bits());
    }
}
