pub mod rebase;

pub use rebase::Rebase;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MathError {
    Overflow,
    DivisionByZero,
}

const LO_MASK: u128 = (1u128 << 64) - 1;

/// Full 256-bit product of two u128 values, as (high, low) limbs.
fn mul_wide(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LO_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LO_MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let (mid, c1) = lh.overflowing_add(hl);
    let (mid, c2) = mid.overflowing_add(ll >> 64);
    let carry = ((c1 as u128) + (c2 as u128)) << 64;

    let lo = (mid << 64) | (ll & LO_MASK);
    let hi = hh + (mid >> 64) + carry;
    (hi, lo)
}

/// Divide the 256-bit value (hi, lo) by `divisor`, returning quotient and
/// remainder. Fails when the quotient does not fit in u128.
fn div_wide(hi: u128, lo: u128, divisor: u128) -> Result<(u128, u128), MathError> {
    if divisor == 0 {
        return Err(MathError::DivisionByZero);
    }
    if hi == 0 {
        return Ok((lo / divisor, lo % divisor));
    }
    if hi >= divisor {
        return Err(MathError::Overflow);
    }

    // Binary long division over the 256-bit dividend. The running
    // remainder stays below 2 * divisor, so a single conditional
    // subtraction per bit suffices.
    let mut rem = hi;
    let mut quot: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        if carry != 0 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quot |= 1 << i;
        }
    }
    Ok((quot, rem))
}

/// `a * b / denominator` with a 256-bit intermediate, rounding down, or up
/// when `round_up` and the division left a remainder.
pub fn mul_div(a: u128, b: u128, denominator: u128, round_up: bool) -> Result<u128, MathError> {
    let (hi, lo) = mul_wide(a, b);
    let (quot, rem) = div_wide(hi, lo, denominator)?;
    if round_up && rem != 0 {
        quot.checked_add(1).ok_or(MathError::Overflow)
    } else {
        Ok(quot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_small_values() {
        assert_eq!(mul_div(10, 10, 4, false).unwrap(), 25);
        assert_eq!(mul_div(10, 10, 3, false).unwrap(), 33);
        assert_eq!(mul_div(10, 10, 3, true).unwrap(), 34);
        assert_eq!(mul_div(0, u128::MAX, 7, true).unwrap(), 0);
    }

    #[test]
    fn mul_div_wide_intermediate() {
        // 1e23 * 1e18 overflows u128 but the quotient fits.
        let a = 100_000_000_000_000_000_000_000u128;
        let e18 = 1_000_000_000_000_000_000u128;
        assert_eq!(mul_div(a, e18, e18, false).unwrap(), a);
        assert_eq!(mul_div(a, 2 * e18, e18, false).unwrap(), 2 * a);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX, false).unwrap(), u128::MAX);
    }

    #[test]
    fn mul_div_rejects_overflow_and_zero_division() {
        assert_eq!(mul_div(u128::MAX, 2, 1, false), Err(MathError::Overflow));
        assert_eq!(mul_div(1, 1, 0, false), Err(MathError::DivisionByZero));
        assert_eq!(
            mul_div(u128::MAX, u128::MAX, 1, false),
            Err(MathError::Overflow)
        );
    }

    #[test]
    fn mul_div_round_up_at_max() {
        // Quotient == u128::MAX with a remainder must not wrap.
        assert_eq!(
            mul_div(u128::MAX, 3, 3, true).unwrap(),
            u128::MAX
        );
    }
}
