//! Arbitrary-precision signed integers for the numeric engine.
//!
//! `BigInt` is sign-magnitude: a sign bit plus a little-endian `Vec<u32>`
//! of limbs holding the absolute value, with no leading (most-significant)
//! zero limb and zero always represented as an empty limb vector with a
//! positive sign. Construction, predicates, compare, add and subtract are
//! native; multiplication and division are delegated to `num-bigint`,
//! mirroring how the original core leans on a bundled big-number library
//! (`libtommath`) for the same two operations rather than reimplementing
//! schoolbook or Karatsuba multiplication itself.

use num_bigint::{BigInt as NumBigInt, BigUint, Sign};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

fn trim(limbs: &mut Vec<u32>) {
    while limbs.last() == Some(&0) {
        limbs.pop();
    }
}

fn cmp_magnitude(a: &[u32], b: &[u32]) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    Ordering::Equal
}

/// `a + b`, both taken as unsigned magnitudes.
fn add_magnitude(a: &[u32], b: &[u32]) -> Vec<u32> {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut result = Vec::with_capacity(long.len() + 1);
    let mut carry: u64 = 0;
    for i in 0..long.len() {
        let x = long[i] as u64 + carry + *short.get(i).unwrap_or(&0) as u64;
        result.push(x as u32);
        carry = x >> 32;
    }
    if carry != 0 {
        result.push(carry as u32);
    }
    result
}

/// `a - b`, requires `a >= b` as unsigned magnitudes.
fn sub_magnitude(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut result = Vec::with_capacity(a.len());
    let mut borrow: i64 = 0;
    for i in 0..a.len() {
        let x = a[i] as i64 - borrow - *b.get(i).unwrap_or(&0) as i64;
        if x < 0 {
            result.push((x + (1i64 << 32)) as u32);
            borrow = 1;
        } else {
            result.push(x as u32);
            borrow = 0;
        }
    }
    trim(&mut result);
    result
}

/// An arbitrary-precision signed integer.
#[derive(Clone, Debug)]
pub struct BigInt {
    negative: bool,
    limbs: Vec<u32>,
}

impl BigInt {
    pub fn zero() -> Self {
        BigInt {
            negative: false,
            limbs: Vec::new(),
        }
    }

    fn from_parts(negative: bool, mut limbs: Vec<u32>) -> Self {
        trim(&mut limbs);
        let negative = negative && !limbs.is_empty();
        BigInt { negative, limbs }
    }

    fn from_u64_magnitude(mag: u64, negative: bool) -> Self {
        if mag == 0 {
            return Self::zero();
        }
        let mut limbs = vec![(mag & 0xFFFF_FFFF) as u32];
        let hi = (mag >> 32) as u32;
        if hi != 0 {
            limbs.push(hi);
        }
        BigInt { negative, limbs }
    }

    /// Splits a native 64-bit word into limbs.
    pub fn from_i64(v: i64) -> Self {
        if v == 0 {
            return Self::zero();
        }
        Self::from_u64_magnitude(v.unsigned_abs(), v < 0)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::from_u64_magnitude(v, false)
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_even(&self) -> bool {
        self.limbs.first().is_none_or(|l| l & 1 == 0)
    }

    pub fn is_odd(&self) -> bool {
        !self.is_even()
    }

    fn magnitude_u64(&self) -> Option<u64> {
        if self.limbs.len() > 2 {
            return None;
        }
        let mut v: u64 = 0;
        for (i, &limb) in self.limbs.iter().enumerate() {
            v |= (limb as u64) << (32 * i);
        }
        Some(v)
    }

    fn magnitude_u128(&self) -> Option<u128> {
        if self.limbs.len() > 4 {
            return None;
        }
        let mut v: u128 = 0;
        for (i, &limb) in self.limbs.iter().enumerate() {
            v |= (limb as u128) << (32 * i);
        }
        Some(v)
    }

    /// `true` if this value round-trips through `i64` (the "native int"
    /// width).
    pub fn fits_native(&self) -> bool {
        self.to_i64().is_some()
    }

    /// `true` if this value round-trips through `i128` (the "wide int"
    /// width).
    pub fn fits_wide(&self) -> bool {
        self.to_i128().is_some()
    }

    pub fn to_i64(&self) -> Option<i64> {
        let mag = self.magnitude_u64()?;
        if self.negative {
            if mag == 1u64 << 63 {
                Some(i64::MIN)
            } else if mag < 1u64 << 63 {
                Some(-(mag as i64))
            } else {
                None
            }
        } else if mag <= i64::MAX as u64 {
            Some(mag as i64)
        } else {
            None
        }
    }

    pub fn to_i128(&self) -> Option<i128> {
        let mag = self.magnitude_u128()?;
        if self.negative {
            if mag == 1u128 << 127 {
                Some(i128::MIN)
            } else if mag < 1u128 << 127 {
                Some(-(mag as i128))
            } else {
                None
            }
        } else if mag <= i128::MAX as u128 {
            Some(mag as i128)
        } else {
            None
        }
    }

    pub fn neg(&self) -> Self {
        if self.is_zero() {
            self.clone()
        } else {
            BigInt {
                negative: !self.negative,
                limbs: self.limbs.clone(),
            }
        }
    }

    pub fn abs(&self) -> Self {
        BigInt {
            negative: false,
            limbs: self.limbs.clone(),
        }
    }

    /// Magnitude-only compare, ignoring sign.
    pub fn cmp_magnitude(&self, other: &Self) -> Ordering {
        cmp_magnitude(&self.limbs, &other.limbs)
    }

    pub fn add(&self, other: &Self) -> Self {
        if self.negative == other.negative {
            Self::from_parts(self.negative, add_magnitude(&self.limbs, &other.limbs))
        } else {
            match cmp_magnitude(&self.limbs, &other.limbs) {
                Ordering::Equal => Self::zero(),
                Ordering::Greater => Self::from_parts(self.negative, sub_magnitude(&self.limbs, &other.limbs)),
                Ordering::Less => Self::from_parts(other.negative, sub_magnitude(&other.limbs, &self.limbs)),
            }
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    fn to_num_bigint(&self) -> NumBigInt {
        let mag = BigUint::new(self.limbs.clone());
        let sign = if self.is_zero() {
            Sign::NoSign
        } else if self.negative {
            Sign::Minus
        } else {
            Sign::Plus
        };
        NumBigInt::from_biguint(sign, mag)
    }

    fn from_num_bigint(n: NumBigInt) -> Self {
        let (sign, mag) = n.into_parts();
        Self::from_parts(sign == Sign::Minus, mag.to_u32_digits())
    }

    /// Delegated to `num-bigint`: the core owns only representation and
    /// small-integer conversion, not multiplication's carry propagation.
    pub fn mul(&self, other: &Self) -> Self {
        Self::from_num_bigint(&self.to_num_bigint() * &other.to_num_bigint())
    }

    /// Truncating division, `None` on division by zero. Delegated to
    /// `num-bigint` like [`BigInt::mul`].
    pub fn div_rem(&self, other: &Self) -> Option<(Self, Self)> {
        if other.is_zero() {
            return None;
        }
        let a = self.to_num_bigint();
        let b = other.to_num_bigint();
        let q = &a / &b;
        let r = &a % &b;
        Some((Self::from_num_bigint(q), Self::from_num_bigint(r)))
    }
}

impl PartialEq for BigInt {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for BigInt {}

impl PartialOrd for BigInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => cmp_magnitude(&self.limbs, &other.limbs),
            (true, true) => cmp_magnitude(&self.limbs, &other.limbs).reverse(),
        }
    }
}

impl Add for &BigInt {
    type Output = BigInt;
    fn add(self, rhs: &BigInt) -> BigInt {
        BigInt::add(self, rhs)
    }
}

impl Sub for &BigInt {
    type Output = BigInt;
    fn sub(self, rhs: &BigInt) -> BigInt {
        BigInt::sub(self, rhs)
    }
}

impl Neg for &BigInt {
    type Output = BigInt;
    fn neg(self) -> BigInt {
        BigInt::neg(self)
    }
}

impl From<i64> for BigInt {
    fn from(v: i64) -> Self {
        BigInt::from_i64(v)
    }
}

impl From<u64> for BigInt {
    fn from(v: u64) -> Self {
        BigInt::from_u64(v)
    }
}

impl fmt::Display for BigInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_num_bigint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_round_trip() {
        for v in [0i64, 1, -1, i64::MAX, i64::MIN, 12345, -98765] {
            let b = BigInt::from_i64(v);
            assert_eq!(b.to_i64(), Some(v), "v={v}");
            assert!(b.fits_native());
        }
    }

    #[test]
    fn zero_is_canonical() {
        let a = BigInt::from_i64(5);
        let b = BigInt::from_i64(-5);
        let z = a.add(&b);
        assert!(z.is_zero());
        assert!(!z.is_negative());
    }

    #[test]
    fn add_across_limb_boundary_carries() {
        let a = BigInt::from_u64(u64::MAX);
        let b = BigInt::from_i64(1);
        let sum = a.add(&b);
        assert_eq!(sum.to_i128(), Some(u64::MAX as i128 + 1));
    }

    #[test]
    fn subtract_swaps_and_flips_sign() {
        let a = BigInt::from_i64(10);
        let b = BigInt::from_i64(25);
        assert_eq!(a.sub(&b), BigInt::from_i64(-15));
    }

    #[test]
    fn mul_and_div_rem_delegate_correctly() {
        let a = BigInt::from_i64(123_456_789);
        let b = BigInt::from_i64(-987);
        let product = a.mul(&b);
        assert_eq!(product.to_i64(), Some(123_456_789i64 * -987));

        let (q, r) = a.div_rem(&BigInt::from_i64(1000)).unwrap();
        assert_eq!(q.to_i64(), Some(123_456));
        assert_eq!(r.to_i64(), Some(789));
        assert!(a.div_rem(&BigInt::zero()).is_none());
    }

    #[test]
    fn ordering_is_sign_then_magnitude() {
        assert!(BigInt::from_i64(-5) < BigInt::from_i64(-1));
        assert!(BigInt::from_i64(-1) < BigInt::from_i64(0));
        assert!(BigInt::from_i64(3) < BigInt::from_i64(100));
    }

    #[quickcheck_macros::quickcheck]
    fn add_is_commutative(x: i64, y: i64) -> bool {
        let a = BigInt::from_i64(x);
        let b = BigInt::from_i64(y);
        a.add(&b) == b.add(&a)
    }

    #[quickcheck_macros::quickcheck]
    fn add_neg_is_zero(x: i64) -> bool {
        let a = BigInt::from_i64(x);
        a.add(&a.neg()).is_zero()
    }

    #[quickcheck_macros::quickcheck]
    fn sub_add_round_trip(x: i64, y: i64) -> bool {
        let a = BigInt::from_i64(x);
        let b = BigInt::from_i64(y);
        a.add(&b).sub(&b) == a
    }

    #[quickcheck_macros::quickcheck]
    fn wide_round_trip(x: i64) -> bool {
        let a = BigInt::from_i64(x);
        a.to_i128().map(|w| w == x as i128) == Some(true)
    }
}
