//! Field Arithmetic
//!
//! Four-limb Montgomery arithmetic for the two 254-bit prime fields of the
//! Grumpkin/BN254 cycle.
//!
//! ```text
//!   Base    p = BN254 scalar field   (Grumpkin coordinates)
//!   Scalar  n = BN254 base field     (Grumpkin group order, private keys)
//! ```
//!
//! Elements are kept fully reduced in Montgomery form, so limbs compare
//! values. Addition, subtraction, negation, multiplication and the final
//! reduction use carry/borrow masks, never a branch on limb values.
//! Exponentiation branches only on the exponent, which is always a public
//! constant of the field. `sqrt_vartime` is for public data only.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::RngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, CtOption};

use crate::error::{Result, StealthError};
use crate::params::FIELD_BYTES;

/// `a + b + carry`, returning the low word and the carry.
#[inline(always)]
const fn adc(a: u64, b: u64, carry: u64) -> (u64, u64) {
    let ret = (a as u128) + (b as u128) + (carry as u128);
    (ret as u64, (ret >> 64) as u64)
}

/// `a - (b + borrow)`; the returned borrow is all ones on underflow.
#[inline(always)]
const fn sbb(a: u64, b: u64, borrow: u64) -> (u64, u64) {
    let ret = (a as u128).wrapping_sub((b as u128) + ((borrow >> 63) as u128));
    (ret as u64, (ret >> 64) as u64)
}

/// `a + b * c + carry`, returning the low word and the carry.
#[inline(always)]
const fn mac(a: u64, b: u64, c: u64, carry: u64) -> (u64, u64) {
    let ret = (a as u128) + ((b as u128) * (c as u128)) + (carry as u128);
    (ret as u64, (ret >> 64) as u64)
}

/// Big-endian bytes to little-endian limbs.
fn be_limbs(bytes: &[u8; FIELD_BYTES]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (i, chunk) in bytes.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        limbs[3 - i] = u64::from_be_bytes(word);
    }
    limbs
}

/// Encoding and parity of field elements, shared by [`Base`] and [`Scalar`].
pub trait FieldOps: Sized + Copy + ConstantTimeEq + ConditionallySelectable {
    /// Parity of the canonical integer representative.
    fn is_odd(&self) -> Choice;

    /// 32-byte big-endian encoding.
    fn to_be32(&self) -> [u8; FIELD_BYTES];

    /// Strict decoding: rejects values >= modulus.
    fn from_be32(bytes: &[u8; FIELD_BYTES]) -> Result<Self>;

    /// Decodes a slice that must be exactly 32 bytes.
    fn from_be_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; FIELD_BYTES] =
            bytes
                .try_into()
                .map_err(|_| StealthError::InvalidLength {
                    expected: FIELD_BYTES,
                    got: bytes.len(),
                })?;
        Self::from_be32(&arr)
    }
}

macro_rules! impl_binops {
    ($name:ident, $op:ident, $op_fn:ident, $assign:ident, $assign_fn:ident, $inner:ident) => {
        impl $op<$name> for $name {
            type Output = $name;

            #[inline]
            fn $op_fn(self, rhs: $name) -> $name {
                $name::$inner(&self, &rhs)
            }
        }

        impl<'a> $op<&'a $name> for $name {
            type Output = $name;

            #[inline]
            fn $op_fn(self, rhs: &'a $name) -> $name {
                $name::$inner(&self, rhs)
            }
        }

        impl<'a> $op<$name> for &'a $name {
            type Output = $name;

            #[inline]
            fn $op_fn(self, rhs: $name) -> $name {
                $name::$inner(self, &rhs)
            }
        }

        impl<'a, 'b> $op<&'b $name> for &'a $name {
            type Output = $name;

            #[inline]
            fn $op_fn(self, rhs: &'b $name) -> $name {
                $name::$inner(self, rhs)
            }
        }

        impl $assign<$name> for $name {
            #[inline]
            fn $assign_fn(&mut self, rhs: $name) {
                *self = $name::$inner(self, &rhs);
            }
        }

        impl<'a> $assign<&'a $name> for $name {
            #[inline]
            fn $assign_fn(&mut self, rhs: &'a $name) {
                *self = $name::$inner(self, rhs);
            }
        }
    };
}

macro_rules! montgomery_field {
    (
        $(#[$meta:meta])*
        $name:ident {
            modulus: $modulus:expr,
            inv: $inv:expr,
            r: $r:expr,
            r2: $r2:expr,
            r3: $r3:expr,
            modulus_minus_two: $pm2:expr,
            modulus_minus_one_div_two: $pm1d2:expr,
            two_adicity: $s:expr,
            trace_minus_one_div_two: $tm1d2:expr,
            two_adic_root: $root:expr $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy)]
        pub struct $name([u64; 4]);

        impl $name {
            const MODULUS: Self = Self($modulus);
            /// `-p^-1 mod 2^64`
            const INV: u64 = $inv;
            const R2: Self = Self($r2);
            const R3: Self = Self($r3);
            const MODULUS_MINUS_TWO: [u64; 4] = $pm2;
            const MODULUS_MINUS_ONE_DIV_TWO: [u64; 4] = $pm1d2;
            /// `p - 1 = 2^s * t` with `t` odd
            const TWO_ADICITY: u32 = $s;
            const TRACE_MINUS_ONE_DIV_TWO: [u64; 4] = $tm1d2;
            const TWO_ADIC_ROOT: Self = Self::from_raw($root);

            pub const ZERO: Self = Self([0; 4]);
            pub const ONE: Self = Self($r);

            /// Bit length of the modulus.
            pub const NUM_BITS: u32 = 256 - Self::MODULUS.0[3].leading_zeros();

            /// Element from little-endian canonical limbs. Any 256-bit value
            /// is accepted and reduced.
            pub const fn from_raw(limbs: [u64; 4]) -> Self {
                Self::mul(&Self(limbs), &Self::R2)
            }

            pub const fn from_u64(v: u64) -> Self {
                Self::from_raw([v, 0, 0, 0])
            }

            /// Reduces a 32-byte big-endian integer modulo p.
            pub fn from_be_bytes_mod_order(bytes: &[u8; FIELD_BYTES]) -> Self {
                Self::from_raw(be_limbs(bytes))
            }

            /// Reduces a 512-bit little-endian integer modulo p.
            fn from_u512(limbs: [u64; 8]) -> Self {
                let lo = Self([limbs[0], limbs[1], limbs[2], limbs[3]]);
                let hi = Self([limbs[4], limbs[5], limbs[6], limbs[7]]);
                lo.mul(&Self::R2).add(&hi.mul(&Self::R3))
            }

            /// Uniform element from 64 random bytes.
            pub fn random(mut rng: impl RngCore) -> Self {
                let mut buf = [0u8; 64];
                rng.fill_bytes(&mut buf);
                let mut limbs = [0u64; 8];
                for (limb, chunk) in limbs.iter_mut().zip(buf.chunks_exact(8)) {
                    let mut word = [0u8; 8];
                    word.copy_from_slice(chunk);
                    *limb = u64::from_le_bytes(word);
                }
                Self::from_u512(limbs)
            }

            /// Canonical integer value as little-endian limbs.
            pub const fn to_le_limbs(&self) -> [u64; 4] {
                Self::montgomery_reduce(self.0[0], self.0[1], self.0[2], self.0[3], 0, 0, 0, 0).0
            }

            pub fn is_zero(&self) -> Choice {
                self.ct_eq(&Self::ZERO)
            }

            pub const fn add(&self, rhs: &Self) -> Self {
                let (d0, carry) = adc(self.0[0], rhs.0[0], 0);
                let (d1, carry) = adc(self.0[1], rhs.0[1], carry);
                let (d2, carry) = adc(self.0[2], rhs.0[2], carry);
                let (d3, _) = adc(self.0[3], rhs.0[3], carry);

                // p < 2^255, so the sum fits in four limbs
                Self::sub(&Self([d0, d1, d2, d3]), &Self::MODULUS)
            }

            pub const fn sub(&self, rhs: &Self) -> Self {
                let (d0, borrow) = sbb(self.0[0], rhs.0[0], 0);
                let (d1, borrow) = sbb(self.0[1], rhs.0[1], borrow);
                let (d2, borrow) = sbb(self.0[2], rhs.0[2], borrow);
                let (d3, borrow) = sbb(self.0[3], rhs.0[3], borrow);

                // borrow is a mask: add the modulus back on underflow
                let m = Self::MODULUS.0;
                let (d0, carry) = adc(d0, m[0] & borrow, 0);
                let (d1, carry) = adc(d1, m[1] & borrow, carry);
                let (d2, carry) = adc(d2, m[2] & borrow, carry);
                let (d3, _) = adc(d3, m[3] & borrow, carry);
                Self([d0, d1, d2, d3])
            }

            pub const fn neg(&self) -> Self {
                let m = Self::MODULUS.0;
                let (d0, borrow) = sbb(m[0], self.0[0], 0);
                let (d1, borrow) = sbb(m[1], self.0[1], borrow);
                let (d2, borrow) = sbb(m[2], self.0[2], borrow);
                let (d3, _) = sbb(m[3], self.0[3], borrow);

                // -0 must be 0, not p
                let mask =
                    (((self.0[0] | self.0[1] | self.0[2] | self.0[3]) == 0) as u64).wrapping_sub(1);
                Self([d0 & mask, d1 & mask, d2 & mask, d3 & mask])
            }

            pub const fn mul(&self, rhs: &Self) -> Self {
                let (r0, carry) = mac(0, self.0[0], rhs.0[0], 0);
                let (r1, carry) = mac(0, self.0[0], rhs.0[1], carry);
                let (r2, carry) = mac(0, self.0[0], rhs.0[2], carry);
                let (r3, r4) = mac(0, self.0[0], rhs.0[3], carry);

                let (r1, carry) = mac(r1, self.0[1], rhs.0[0], 0);
                let (r2, carry) = mac(r2, self.0[1], rhs.0[1], carry);
                let (r3, carry) = mac(r3, self.0[1], rhs.0[2], carry);
                let (r4, r5) = mac(r4, self.0[1], rhs.0[3], carry);

                let (r2, carry) = mac(r2, self.0[2], rhs.0[0], 0);
                let (r3, carry) = mac(r3, self.0[2], rhs.0[1], carry);
                let (r4, carry) = mac(r4, self.0[2], rhs.0[2], carry);
                let (r5, r6) = mac(r5, self.0[2], rhs.0[3], carry);

                let (r3, carry) = mac(r3, self.0[3], rhs.0[0], 0);
                let (r4, carry) = mac(r4, self.0[3], rhs.0[1], carry);
                let (r5, carry) = mac(r5, self.0[3], rhs.0[2], carry);
                let (r6, r7) = mac(r6, self.0[3], rhs.0[3], carry);

                Self::montgomery_reduce(r0, r1, r2, r3, r4, r5, r6, r7)
            }

            #[allow(clippy::too_many_arguments)]
            const fn montgomery_reduce(
                r0: u64,
                r1: u64,
                r2: u64,
                r3: u64,
                r4: u64,
                r5: u64,
                r6: u64,
                r7: u64,
            ) -> Self {
                let m = Self::MODULUS.0;

                let k = r0.wrapping_mul(Self::INV);
                let (_, carry) = mac(r0, k, m[0], 0);
                let (r1, carry) = mac(r1, k, m[1], carry);
                let (r2, carry) = mac(r2, k, m[2], carry);
                let (r3, carry) = mac(r3, k, m[3], carry);
                let (r4, carry2) = adc(r4, 0, carry);

                let k = r1.wrapping_mul(Self::INV);
                let (_, carry) = mac(r1, k, m[0], 0);
                let (r2, carry) = mac(r2, k, m[1], carry);
                let (r3, carry) = mac(r3, k, m[2], carry);
                let (r4, carry) = mac(r4, k, m[3], carry);
                let (r5, carry2) = adc(r5, carry2, carry);

                let k = r2.wrapping_mul(Self::INV);
                let (_, carry) = mac(r2, k, m[0], 0);
                let (r3, carry) = mac(r3, k, m[1], carry);
                let (r4, carry) = mac(r4, k, m[2], carry);
                let (r5, carry) = mac(r5, k, m[3], carry);
                let (r6, carry2) = adc(r6, carry2, carry);

                let k = r3.wrapping_mul(Self::INV);
                let (_, carry) = mac(r3, k, m[0], 0);
                let (r4, carry) = mac(r4, k, m[1], carry);
                let (r5, carry) = mac(r5, k, m[2], carry);
                let (r6, carry) = mac(r6, k, m[3], carry);
                let (r7, _) = adc(r7, carry2, carry);

                // result < 2p; one masked subtraction brings it below p
                Self::sub(&Self([r4, r5, r6, r7]), &Self::MODULUS)
            }

            pub const fn square(&self) -> Self {
                self.mul(self)
            }

            pub const fn double(&self) -> Self {
                self.add(self)
            }

            /// `self^exp`. Time depends on `exp` only.
            pub fn pow_vartime(&self, exp: &[u64; 4]) -> Self {
                let mut acc = Self::ONE;
                for limb in exp.iter().rev() {
                    for i in (0..64).rev() {
                        acc = acc.square();
                        if (limb >> i) & 1 == 1 {
                            acc = acc.mul(self);
                        }
                    }
                }
                acc
            }

            /// Fermat inverse `self^(p-2)`; none for zero.
            pub fn invert(&self) -> CtOption<Self> {
                CtOption::new(self.pow_vartime(&Self::MODULUS_MINUS_TWO), !self.is_zero())
            }

            /// Tonelli-Shanks square root; `None` for non-residues.
            ///
            /// Branches on the input. Only call it on public values.
            pub fn sqrt_vartime(&self) -> Option<Self> {
                if bool::from(self.is_zero()) {
                    return Some(Self::ZERO);
                }

                // Euler criterion
                if self.pow_vartime(&Self::MODULUS_MINUS_ONE_DIV_TWO) != Self::ONE {
                    return None;
                }

                let w = self.pow_vartime(&Self::TRACE_MINUS_ONE_DIV_TWO);
                let mut m = Self::TWO_ADICITY;
                let mut c = Self::TWO_ADIC_ROOT;
                let mut r = w * self;
                let mut t = w * r;

                while t != Self::ONE {
                    let mut i = 0u32;
                    let mut t_pow = t;
                    while t_pow != Self::ONE {
                        t_pow = t_pow.square();
                        i += 1;
                        if i == m {
                            return None;
                        }
                    }

                    let mut b = c;
                    for _ in 0..(m - i - 1) {
                        b = b.square();
                    }
                    m = i;
                    c = b.square();
                    t *= c;
                    r *= b;
                }

                (r.square() == *self).then_some(r)
            }
        }

        impl FieldOps for $name {
            fn is_odd(&self) -> Choice {
                Choice::from((self.to_le_limbs()[0] & 1) as u8)
            }

            fn to_be32(&self) -> [u8; FIELD_BYTES] {
                let limbs = self.to_le_limbs();
                let mut out = [0u8; FIELD_BYTES];
                for (i, chunk) in out.chunks_exact_mut(8).enumerate() {
                    chunk.copy_from_slice(&limbs[3 - i].to_be_bytes());
                }
                out
            }

            fn from_be32(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
                let limbs = be_limbs(bytes);
                let m = Self::MODULUS.0;
                let (_, borrow) = sbb(limbs[0], m[0], 0);
                let (_, borrow) = sbb(limbs[1], m[1], borrow);
                let (_, borrow) = sbb(limbs[2], m[2], borrow);
                let (_, borrow) = sbb(limbs[3], m[3], borrow);

                // underflow iff limbs < p
                let canonical = Choice::from((borrow as u8) & 1);
                Option::from(CtOption::new(Self::from_raw(limbs), canonical))
                    .ok_or(StealthError::NonCanonicalEncoding)
            }
        }

        impl ConstantTimeEq for $name {
            fn ct_eq(&self, other: &Self) -> Choice {
                self.0[0].ct_eq(&other.0[0])
                    & self.0[1].ct_eq(&other.0[1])
                    & self.0[2].ct_eq(&other.0[2])
                    & self.0[3].ct_eq(&other.0[3])
            }
        }

        impl ConditionallySelectable for $name {
            fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
                Self([
                    u64::conditional_select(&a.0[0], &b.0[0], choice),
                    u64::conditional_select(&a.0[1], &b.0[1], choice),
                    u64::conditional_select(&a.0[2], &b.0[2], choice),
                    u64::conditional_select(&a.0[3], &b.0[3], choice),
                ])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                bool::from(self.ct_eq(other))
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self::from_u64(v)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.to_be32()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }

        impl Neg for $name {
            type Output = $name;

            #[inline]
            fn neg(self) -> $name {
                $name::neg(&self)
            }
        }

        impl<'a> Neg for &'a $name {
            type Output = $name;

            #[inline]
            fn neg(self) -> $name {
                $name::neg(self)
            }
        }

        impl_binops!($name, Add, add, AddAssign, add_assign, add);
        impl_binops!($name, Sub, sub, SubAssign, sub_assign, sub);
        impl_binops!($name, Mul, mul, MulAssign, mul_assign, mul);
    };
}

montgomery_field! {
    /// Coordinate field of Grumpkin points (the BN254 scalar field).
    Base {
        modulus: [
            0x43e1f593f0000001,
            0x2833e84879b97091,
            0xb85045b68181585d,
            0x30644e72e131a029,
        ],
        inv: 0xc2e1f593efffffff,
        r: [
            0xac96341c4ffffffb,
            0x36fc76959f60cd29,
            0x666ea36f7879462e,
            0x0e0a77c19a07df2f,
        ],
        r2: [
            0x1bb8e645ae216da7,
            0x53fe3ab1e35c59e3,
            0x8c49833d53bb8085,
            0x0216d0b17f4e44a5,
        ],
        r3: [
            0x5e94d8e1b4bf0040,
            0x2a489cbe1cfbb6b8,
            0x893cc664a19fcfed,
            0x0cf8594b7fcc657c,
        ],
        modulus_minus_two: [
            0x43e1f593efffffff,
            0x2833e84879b97091,
            0xb85045b68181585d,
            0x30644e72e131a029,
        ],
        modulus_minus_one_div_two: [
            0xa1f0fac9f8000000,
            0x9419f4243cdcb848,
            0xdc2822db40c0ac2e,
            0x183227397098d014,
        ],
        two_adicity: 28,
        trace_minus_one_div_two: [
            0xcdcb848a1f0fac9f,
            0x0c0ac2e9419f4243,
            0x098d014dc2822db4,
            0x0000000183227397,
        ],
        // 5^t, 5 being a non-residue
        two_adic_root: [
            0x9bd61b6e725b19f0,
            0x402d111e41112ed4,
            0x00e0a7eb8ef62abc,
            0x2a3c09f0a58a7e85,
        ],
    }
}

montgomery_field! {
    /// Scalar field of the Grumpkin group (the BN254 base field).
    Scalar {
        modulus: [
            0x3c208c16d87cfd47,
            0x97816a916871ca8d,
            0xb85045b68181585d,
            0x30644e72e131a029,
        ],
        inv: 0x87d20782e4866389,
        r: [
            0xd35d438dc58f0d9d,
            0x0a78eb28f5c70b3d,
            0x666ea36f7879462c,
            0x0e0a77c19a07df2f,
        ],
        r2: [
            0xf32cfc5b538afa89,
            0xb5e71911d44501fb,
            0x47ab1eff0a417ff6,
            0x06d89f71cab8351f,
        ],
        r3: [
            0xb1cd6dafda1530df,
            0x62f210e6a7283db6,
            0xef7f0b0c0ada0afb,
            0x20fd6e902d592544,
        ],
        modulus_minus_two: [
            0x3c208c16d87cfd45,
            0x97816a916871ca8d,
            0xb85045b68181585d,
            0x30644e72e131a029,
        ],
        modulus_minus_one_div_two: [
            0x9e10460b6c3e7ea3,
            0xcbc0b548b438e546,
            0xdc2822db40c0ac2e,
            0x183227397098d014,
        ],
        two_adicity: 1,
        trace_minus_one_div_two: [
            0x4f082305b61f3f51,
            0x65e05aa45a1c72a3,
            0x6e14116da0605617,
            0x0c19139cb84c680a,
        ],
        // n = 3 mod 4: the 2-adic root is -1
        two_adic_root: [
            0x3c208c16d87cfd46,
            0x97816a916871ca8d,
            0xb85045b68181585d,
            0x30644e72e131a029,
        ],
    }
}

/// Serde adapter: a field element as 64 lowercase hex chars (big-endian).
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::FieldOps;

    pub fn serialize<F: FieldOps, S: Serializer>(
        value: &F,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(value.to_be32()))
    }

    pub fn deserialize<'de, F: FieldOps, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<F, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(de::Error::custom)?;
        F::from_be_slice(&bytes).map_err(de::Error::custom)
    }
}

/// Serde adapter for a list of field elements.
pub mod serde_hex_vec {
    use serde::{Deserialize, Deserializer, Serializer, de, ser::SerializeSeq};

    use super::FieldOps;

    pub fn serialize<F: FieldOps, S: Serializer>(
        values: &[F],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&hex::encode(v.to_be32()))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, F: FieldOps, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<F>, D::Error> {
        let items = Vec::<String>::deserialize(deserializer)?;
        items
            .iter()
            .map(|s| {
                let bytes = hex::decode(s.trim_start_matches("0x")).map_err(de::Error::custom)?;
                F::from_be_slice(&bytes).map_err(de::Error::custom)
            })
            .collect()
    }
}
