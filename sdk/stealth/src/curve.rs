//! Grumpkin Curve
//!
//! Affine points on `y^2 = x^3 - 17` with constant-time group law.
//!
//! ```text
//!   add(P, Q):  lambda_add = (y2 - y1) / (x2 - x1)     always computed
//!               lambda_dbl = 3 x1^2 / 2 y1             always computed
//!               one batched inversion, then select:
//!                 P = O      -> Q
//!                 Q = O      -> P
//!                 P = -Q     -> O
//!                 P = Q      -> lambda_dbl
//!                 otherwise  -> lambda_add
//!
//!   mul(k, P):  Montgomery ladder, 254 iterations for every k
//! ```
//!
//! Addition, doubling, scalar multiplication and compression run the same
//! sequence of field operations for every input; the field layer is
//! branch-free on element values. Decompression handles public bytes and
//! may branch.
//!
//! The identity is encoded as `(0, 0)`. No curve point has `x = 0` because
//! `-17` is a quadratic non-residue, so the encoding is unambiguous.

use std::fmt;
use std::ops::{Add, Neg};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

use crate::error::{Result, StealthError};
use crate::field::FieldOps;
use crate::params::{
    Base, COEFF_B, COMPRESSED_POINT_LEN, FIELD_BYTES, GENERATOR_X, GENERATOR_Y, Scalar,
};

const SIGN_EVEN: u8 = 0x02;
const SIGN_ODD: u8 = 0x03;

/// A Grumpkin point in affine coordinates, or the identity.
///
/// Fields are private: every instance is on the curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurvePoint {
    x: Base,
    y: Base,
}

impl CurvePoint {
    /// The point at infinity, encoded as `(0, 0)`.
    pub const IDENTITY: Self = Self {
        x: Base::ZERO,
        y: Base::ZERO,
    };

    /// The fixed generator `G`.
    pub const GENERATOR: Self = Self {
        x: GENERATOR_X,
        y: GENERATOR_Y,
    };

    /// Build a point from coordinates, rejecting anything off the curve.
    pub fn new(x: Base, y: Base) -> Result<Self> {
        let p = Self { x, y };
        if p.is_on_curve() {
            Ok(p)
        } else {
            Err(StealthError::InvalidPoint("not on curve"))
        }
    }

    pub fn x(&self) -> Base {
        self.x
    }

    pub fn y(&self) -> Base {
        self.y
    }

    pub fn is_identity(&self) -> Choice {
        self.x.ct_eq(&Base::ZERO) & self.y.ct_eq(&Base::ZERO)
    }

    /// True for the identity or any `(x, y)` with `y^2 = x^3 - 17`.
    pub fn is_on_curve(&self) -> bool {
        let lhs = self.y.square();
        let rhs = self.x.square() * self.x + COEFF_B;
        bool::from(self.is_identity() | lhs.ct_eq(&rhs))
    }

    /// Constant-time point addition. Handles doubling, inverses and the
    /// identity without branching.
    pub fn add_point(&self, other: &Self) -> Self {
        let (x1, y1) = (self.x, self.y);
        let (x2, y2) = (other.x, other.y);

        let p_is_id = self.is_identity();
        let q_is_id = other.is_identity();
        let same_x = x1.ct_eq(&x2);
        let same_y = y1.ct_eq(&y2);
        let y1_zero = y1.ct_eq(&Base::ZERO);

        // generic slope numerator/denominator
        let num_add = y2 - y1;
        let den_add = x2 - x1;
        // tangent slope numerator/denominator
        let x1_sq = x1.square();
        let num_dbl = x1_sq.double() + x1_sq;
        let den_dbl = y1.double();

        // replace zero denominators with one so a single inversion serves both
        let den_add = Base::conditional_select(&den_add, &Base::ONE, den_add.is_zero());
        let den_dbl = Base::conditional_select(&den_dbl, &Base::ONE, den_dbl.is_zero());
        let inv = (den_add * den_dbl).invert().unwrap_or(Base::ZERO);
        let lambda_add = num_add * inv * den_dbl;
        let lambda_dbl = num_dbl * inv * den_add;

        let is_double = same_x & same_y;
        let lambda = Base::conditional_select(&lambda_add, &lambda_dbl, is_double);

        let x3 = lambda.square() - x1 - x2;
        let y3 = lambda * (x1 - x3) - y1;
        let mut out = Self { x: x3, y: y3 };

        // P = -Q, or doubling a 2-torsion point
        let to_identity = (same_x & !same_y) | (is_double & y1_zero);
        out = Self::conditional_select(&out, &Self::IDENTITY, to_identity);
        out = Self::conditional_select(&out, self, q_is_id);
        out = Self::conditional_select(&out, other, p_is_id);
        out
    }

    pub fn double(&self) -> Self {
        self.add_point(self)
    }

    /// Constant-time scalar multiplication `k * self`.
    ///
    /// Montgomery ladder over the full scalar bit width; the iteration count
    /// and the sequence of field operations do not depend on `k`.
    pub fn mul(&self, k: &Scalar) -> Self {
        let limbs = k.to_le_limbs();
        let mut r0 = Self::IDENTITY;
        let mut r1 = *self;

        for i in (0..Scalar::NUM_BITS as usize).rev() {
            let bit = Choice::from(((limbs[i / 64] >> (i % 64)) & 1) as u8);
            Self::conditional_swap(&mut r0, &mut r1, bit);
            r1 = r0.add_point(&r1);
            r0 = r0.double();
            Self::conditional_swap(&mut r0, &mut r1, bit);
        }
        r0
    }

    /// `k * G`.
    pub fn mul_generator(k: &Scalar) -> Self {
        Self::GENERATOR.mul(k)
    }

    /// 33-byte compressed encoding; identity is all zeros.
    pub fn compress(&self) -> CompressedPoint {
        let mut out = [0u8; COMPRESSED_POINT_LEN];
        out[0] = SIGN_EVEN | u8::conditional_select(&0, &1, self.y.is_odd());
        out[1..].copy_from_slice(&self.x.to_be32());

        let is_id = self.is_identity();
        for byte in out.iter_mut() {
            *byte = u8::conditional_select(byte, &0, is_id);
        }
        CompressedPoint(out)
    }

    /// Recover a point from its compressed form.
    pub fn decompress(bytes: &CompressedPoint) -> Result<Self> {
        let raw = &bytes.0;
        if raw.iter().all(|b| *b == 0) {
            return Ok(Self::IDENTITY);
        }

        let want_odd = match raw[0] {
            SIGN_EVEN => false,
            SIGN_ODD => true,
            _ => return Err(StealthError::InvalidPoint("bad sign byte")),
        };

        let mut x_bytes = [0u8; FIELD_BYTES];
        x_bytes.copy_from_slice(&raw[1..]);
        let x = Base::from_be32(&x_bytes)
            .map_err(|_| StealthError::InvalidPoint("x not canonical"))?;

        let rhs = x.square() * x + COEFF_B;
        let mut y = rhs
            .sqrt_vartime()
            .ok_or(StealthError::InvalidPoint("x is not on the curve"))?;
        if bool::from(y.is_odd()) != want_odd {
            y = -y;
        }
        if bool::from(y.is_odd()) != want_odd {
            return Err(StealthError::InvalidPoint("no root with requested sign"));
        }

        Self::new(x, y)
    }

    /// Decode from an arbitrary byte slice (must be 33 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decompress(&CompressedPoint::from_slice(bytes)?)
    }
}

impl Default for CurvePoint {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if bool::from(self.is_identity()) {
            return f.write_str("CurvePoint(identity)");
        }
        f.debug_struct("CurvePoint")
            .field("x", &self.x)
            .field("y", &self.y)
            .finish()
    }
}

impl ConditionallySelectable for CurvePoint {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            x: Base::conditional_select(&a.x, &b.x, choice),
            y: Base::conditional_select(&a.y, &b.y, choice),
        }
    }
}

impl ConstantTimeEq for CurvePoint {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.x.ct_eq(&other.x) & self.y.ct_eq(&other.y)
    }
}

impl Add for CurvePoint {
    type Output = CurvePoint;

    fn add(self, rhs: Self) -> Self::Output {
        self.add_point(&rhs)
    }
}

impl Neg for CurvePoint {
    type Output = CurvePoint;

    fn neg(self) -> Self::Output {
        Self {
            x: self.x,
            y: -self.y,
        }
    }
}

impl Serialize for CurvePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.compress().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let compressed = CompressedPoint::deserialize(deserializer)?;
        CurvePoint::decompress(&compressed).map_err(serde::de::Error::custom)
    }
}

/// Wire form of a point: sign byte (0x02 even y, 0x03 odd y) + big-endian x.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPoint(pub [u8; COMPRESSED_POINT_LEN]);

impl CompressedPoint {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; COMPRESSED_POINT_LEN] =
            bytes
                .try_into()
                .map_err(|_| StealthError::InvalidLength {
                    expected: COMPRESSED_POINT_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; COMPRESSED_POINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s)?)
    }
}

impl AsRef<[u8]> for CompressedPoint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CompressedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedPoint({})", self.to_hex())
    }
}

impl Serialize for CompressedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CompressedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CompressedPoint::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn random_point(rng: &mut StdRng) -> CurvePoint {
        CurvePoint::mul_generator(&Scalar::random(rng))
    }

    #[test]
    fn test_generator_on_curve() {
        assert!(CurvePoint::GENERATOR.is_on_curve());
        assert!(CurvePoint::IDENTITY.is_on_curve());
        assert!(
            CurvePoint::new(Base::from(1u64), Base::from(2u64)).is_err(),
            "(1, 2) is not a Grumpkin point"
        );
    }

    #[test]
    fn test_group_order() {
        // n * G = O, computed as (n - 1) * G + G
        let minus_one = -Scalar::ONE;
        let p = CurvePoint::mul_generator(&minus_one);
        assert_eq!(p, -CurvePoint::GENERATOR);
        assert_eq!(p + CurvePoint::GENERATOR, CurvePoint::IDENTITY);
    }

    #[test]
    fn test_identity_laws() {
        let g = CurvePoint::GENERATOR;
        assert_eq!(g + CurvePoint::IDENTITY, g);
        assert_eq!(CurvePoint::IDENTITY + g, g);
        assert_eq!(
            CurvePoint::IDENTITY + CurvePoint::IDENTITY,
            CurvePoint::IDENTITY
        );
        assert_eq!(g + (-g), CurvePoint::IDENTITY, "P + (-P) should be identity");
    }

    #[test]
    fn test_add_commutative_associative() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = random_point(&mut rng);
        let b = random_point(&mut rng);
        let c = random_point(&mut rng);
        assert_eq!(a + b, b + a);
        assert_eq!((a + b) + c, a + (b + c));
        assert!((a + b).is_on_curve());
    }

    #[test]
    fn test_double_matches_add() {
        let g = CurvePoint::GENERATOR;
        let two_g = g.double();
        assert!(two_g.is_on_curve());
        assert_eq!(two_g, CurvePoint::mul_generator(&Scalar::from(2u64)));
        assert_eq!(two_g + g, g + two_g);
    }

    #[test]
    fn test_scalar_mul_matches_repeated_addition() {
        let g = CurvePoint::GENERATOR;
        for k in [0u64, 1, 2, 3, 100] {
            let mut naive = CurvePoint::IDENTITY;
            for _ in 0..k {
                naive = naive + g;
            }
            assert_eq!(
                CurvePoint::mul_generator(&Scalar::from(k)),
                naive,
                "k = {k}"
            );
        }
    }

    #[test]
    fn test_scalar_mul_distributes() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Scalar::random(&mut rng);
        let b = Scalar::random(&mut rng);
        let lhs = CurvePoint::mul_generator(&(a + b));
        let rhs = CurvePoint::mul_generator(&a) + CurvePoint::mul_generator(&b);
        assert_eq!(lhs, rhs);
        let ab = CurvePoint::mul_generator(&a).mul(&b);
        assert_eq!(ab, CurvePoint::mul_generator(&(a * b)));
    }

    #[test]
    fn test_mul_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let k = Scalar::random(&mut rng);
        assert_eq!(CurvePoint::IDENTITY.mul(&k), CurvePoint::IDENTITY);
    }

    #[test]
    fn test_compress_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let p = random_point(&mut rng);
            let c = p.compress();
            assert!(c.0[0] == SIGN_EVEN || c.0[0] == SIGN_ODD);
            assert_eq!(CurvePoint::decompress(&c).unwrap(), p);
        }
        let id = CurvePoint::IDENTITY.compress();
        assert_eq!(id.0, [0u8; 33], "identity compresses to zeros");
        assert_eq!(CurvePoint::decompress(&id).unwrap(), CurvePoint::IDENTITY);
    }

    #[test]
    fn test_compress_sign_byte() {
        let g = CurvePoint::GENERATOR;
        let expected = if bool::from(g.y().is_odd()) { SIGN_ODD } else { SIGN_EVEN };
        assert_eq!(g.compress().0[0], expected);
        assert_ne!(g.compress().0[0], (-g).compress().0[0]);
        assert_eq!(g.compress().0[32], 1, "x = 1 big-endian");
    }

    #[test]
    fn test_decompress_rejects_invalid() {
        // x = 0 gives y^2 = -17, a non-residue
        let mut bytes = [0u8; 33];
        bytes[0] = SIGN_EVEN;
        assert!(matches!(
            CurvePoint::decompress(&CompressedPoint(bytes)),
            Err(StealthError::InvalidPoint(_))
        ));

        let mut bad_sign = CurvePoint::GENERATOR.compress();
        bad_sign.0[0] = 0x04;
        assert!(matches!(
            CurvePoint::decompress(&bad_sign),
            Err(StealthError::InvalidPoint(_))
        ));

        let mut too_big = [0xffu8; 33];
        too_big[0] = SIGN_ODD;
        assert_eq!(
            CurvePoint::decompress(&CompressedPoint(too_big)),
            Err(StealthError::InvalidPoint("x not canonical")),
            "x >= p is an invalid point, not a field error"
        );

        // x = p exactly
        let mut x_is_p = [0u8; 33];
        x_is_p[0] = SIGN_EVEN;
        x_is_p[1..].copy_from_slice(&(-Base::ONE).to_be32());
        x_is_p[32] += 1;
        assert_eq!(
            CurvePoint::decompress(&CompressedPoint(x_is_p)),
            Err(StealthError::InvalidPoint("x not canonical"))
        );

        assert!(matches!(
            CurvePoint::from_bytes(&[2u8; 32]),
            Err(StealthError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_serde_hex() {
        let g = CurvePoint::GENERATOR;
        let json = serde_json::to_string(&g).unwrap();
        assert_eq!(json, format!("\"{}\"", g.compress().to_hex()));
        let back: CurvePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
