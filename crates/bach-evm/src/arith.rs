//! 256-bit word arithmetic with EVM semantics (wrapping, two's complement)

use bach_primitives::U256;
use primitive_types::U512;

/// Truncate to usize, saturating on overflow
pub fn as_usize_saturated(v: U256) -> usize {
    if v > U256::from(usize::MAX) {
        usize::MAX
    } else {
        v.low_u64() as usize
    }
}

/// Truncate to u64, saturating on overflow
pub fn as_u64_saturated(v: U256) -> u64 {
    if v > U256::from(u64::MAX) {
        u64::MAX
    } else {
        v.low_u64()
    }
}

// ==================== Unsigned ====================

/// Division, zero on div by zero
pub fn div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a / b
    }
}

/// Modulo, zero on mod by zero
pub fn rem(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        U256::zero()
    } else {
        a % b
    }
}

/// (a + b) % n over 512 bits
pub fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let sum = U512::from(a) + U512::from(b);
    narrow(sum % U512::from(n))
}

/// (a * b) % n over 512 bits
pub fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    narrow(a.full_mul(b) % U512::from(n))
}

/// base^exp mod 2^256
pub fn exp(base: U256, exponent: U256) -> U256 {
    base.overflowing_pow(exponent).0
}

/// Number of bytes needed to represent `v`
pub fn byte_len(v: U256) -> u64 {
    (v.bits() as u64).div_ceil(8)
}

/// BYTE: byte `i` of `x`, 0 = most significant
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        return U256::zero();
    }
    U256::from(x.byte(31 - i.low_u64() as usize))
}

/// SHL
pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value << (shift.low_u64() as usize)
}

/// SHR (logical)
pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        return U256::zero();
    }
    value >> (shift.low_u64() as usize)
}

// ==================== Signed ====================

fn is_negative(v: U256) -> bool {
    v.bit(255)
}

fn negate(v: U256) -> U256 {
    (!v).overflowing_add(U256::one()).0
}

fn abs(v: U256) -> U256 {
    if is_negative(v) {
        negate(v)
    } else {
        v
    }
}

/// Signed division; MIN / -1 wraps to MIN
pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        negate(quotient)
    } else {
        quotient
    }
}

/// Signed modulo, result takes the dividend's sign
pub fn smod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if is_negative(a) {
        negate(remainder)
    } else {
        remainder
    }
}

/// Signed less than
pub fn slt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// Signed greater than
pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}

/// SIGNEXTEND: extend the sign bit of byte `b` (0 = least significant)
pub fn signextend(b: U256, x: U256) -> U256 {
    if b >= U256::from(31) {
        return x;
    }
    let bit = b.low_u64() as usize * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if x.bit(bit) {
        x | !mask
    } else {
        x & mask
    }
}

/// SAR: arithmetic shift right
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    if negative {
        !((!value) >> shift)
    } else {
        value >> shift
    }
}

fn narrow(v: U512) -> U256 {
    // callers reduce modulo a 256-bit value first
    U256::try_from(v).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neg(n: u64) -> U256 {
        negate(U256::from(n))
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(div(U256::from(7), U256::zero()), U256::zero());
        assert_eq!(rem(U256::from(7), U256::zero()), U256::zero());
        assert_eq!(sdiv(U256::from(7), U256::zero()), U256::zero());
        assert_eq!(smod(U256::from(7), U256::zero()), U256::zero());
    }

    #[test]
    fn test_signed_division() {
        assert_eq!(sdiv(neg(10), U256::from(3)), neg(3));
        assert_eq!(sdiv(neg(10), neg(3)), U256::from(3));
        let min = U256::one() << 255;
        assert_eq!(sdiv(min, U256::MAX), min);
    }

    #[test]
    fn test_signed_modulo() {
        assert_eq!(smod(neg(10), U256::from(3)), neg(1));
        assert_eq!(smod(U256::from(10), neg(3)), U256::from(1));
    }

    #[test]
    fn test_mod_arith_no_overflow() {
        assert_eq!(addmod(U256::MAX, U256::from(2), U256::from(10)), U256::from(7));
        assert_eq!(mulmod(U256::MAX, U256::MAX, U256::from(12)), U256::from(9));
        assert_eq!(addmod(U256::from(1), U256::from(2), U256::zero()), U256::zero());
    }

    #[test]
    fn test_exp() {
        assert_eq!(exp(U256::from(2), U256::from(10)), U256::from(1024));
        assert_eq!(exp(U256::from(2), U256::from(256)), U256::zero());
        assert_eq!(byte_len(U256::zero()), 0);
        assert_eq!(byte_len(U256::from(256)), 2);
    }

    #[test]
    fn test_signextend() {
        assert_eq!(signextend(U256::zero(), U256::from(0xff)), U256::MAX);
        assert_eq!(signextend(U256::zero(), U256::from(0x17f)), U256::from(0x7f));
        assert_eq!(signextend(U256::from(31), U256::from(5)), U256::from(5));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(shl(U256::from(4), U256::one()), U256::from(16));
        assert_eq!(shr(U256::from(256), U256::MAX), U256::zero());
        assert_eq!(sar(U256::from(4), neg(16)), neg(1));
        assert_eq!(sar(U256::from(300), neg(1)), U256::MAX);
        assert_eq!(sar(U256::from(1), U256::from(8)), U256::from(4));
    }

    #[test]
    fn test_byte_and_compare() {
        assert_eq!(byte(U256::from(31), U256::from(0xab)), U256::from(0xab));
        assert_eq!(byte(U256::from(32), U256::MAX), U256::zero());
        assert!(slt(neg(1), U256::zero()));
        assert!(sgt(U256::one(), neg(5)));
    }

    #[test]
    fn test_saturating_casts() {
        assert_eq!(as_u64_saturated(U256::MAX), u64::MAX);
        assert_eq!(as_u64_saturated(U256::from(42)), 42);
        assert_eq!(as_usize_saturated(U256::from(42)), 42);
    }
}
