//! Stealth Keys
//!
//! Two independent keypairs per identity:
//!
//! ```text
//! spending (k, K = kG)   spend authority, needed only to claim
//! viewing  (v, V = vG)   detect + decrypt, handed to scanners
//!
//! meta-address = compress(K) || compress(V)   (66 bytes, shareable)
//! ```
//!
//! Wallet input of any shape goes through [`KeySource`] once and becomes a
//! canonical [`StealthKeys`].

use std::fmt;
use std::str::FromStr;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::curve::{CompressedPoint, CurvePoint};
use crate::error::{Result, StealthError};
use crate::field::FieldOps;
use crate::params::{
    COMPRESSED_POINT_LEN, FIELD_BYTES, KEY_DERIVATION_MESSAGE, SPENDING_KEY_TAG, Scalar,
    VIEWING_KEY_TAG,
};

/// A scalar and its public point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    private: Scalar,
    public: CurvePoint,
}

impl KeyPair {
    pub fn from_private(private: Scalar) -> Result<Self> {
        if bool::from(private.is_zero()) {
            return Err(StealthError::InvalidScalar("zero private key"));
        }
        Ok(Self {
            private,
            public: CurvePoint::mul_generator(&private),
        })
    }

    /// Strict 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        Self::from_private(Scalar::from_be32(bytes)?)
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let k = Scalar::random(&mut *rng);
            if !bool::from(k.is_zero()) {
                return Self {
                    private: k,
                    public: CurvePoint::mul_generator(&k),
                };
            }
        }
    }

    pub fn private(&self) -> &Scalar {
        &self.private
    }

    pub fn public(&self) -> &CurvePoint {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private", &"<redacted>")
            .field("public", &self.public.compress())
            .finish()
    }
}

/// Full recipient identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealthKeys {
    pub spending: KeyPair,
    pub viewing: KeyPair,
}

impl StealthKeys {
    pub fn new(spending: KeyPair, viewing: KeyPair) -> Self {
        Self { spending, viewing }
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            spending: KeyPair::random(rng),
            viewing: KeyPair::random(rng),
        }
    }

    /// Deterministic keys from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self> {
        Ok(Self {
            spending: KeyPair::from_private(derive_scalar(SPENDING_KEY_TAG, seed))?,
            viewing: KeyPair::from_private(derive_scalar(VIEWING_KEY_TAG, seed))?,
        })
    }

    /// Keys from a wallet signature over [`KEY_DERIVATION_MESSAGE`].
    pub fn from_signature(signature: &[u8]) -> Result<Self> {
        if signature.is_empty() {
            return Err(StealthError::InvalidLength {
                expected: 64,
                got: 0,
            });
        }
        let seed: [u8; 32] = Sha256::new()
            .chain_update(KEY_DERIVATION_MESSAGE)
            .chain_update(signature)
            .finalize()
            .into();
        Self::from_seed(&seed)
    }

    /// Resolve any supported key input.
    pub fn resolve(source: &KeySource) -> Result<Self> {
        match source {
            KeySource::Raw { spending, viewing } => Ok(Self {
                spending: KeyPair::from_bytes(spending)?,
                viewing: KeyPair::from_bytes(viewing)?,
            }),
            KeySource::Seed(seed) => Self::from_seed(seed),
            KeySource::WalletSignature(sig) => Self::from_signature(sig),
        }
    }

    pub fn meta_address(&self) -> StealthMetaAddress {
        StealthMetaAddress {
            spending_pub: self.spending.public,
            viewing_pub: self.viewing.public,
        }
    }

    /// The scan-only capability; cannot spend.
    pub fn viewing_capability(&self) -> ViewingCapability {
        ViewingCapability {
            viewing: self.viewing,
            spending_pub: self.spending.public,
        }
    }
}

/// Key material accepted at the wallet boundary.
#[derive(Clone)]
pub enum KeySource {
    /// Big-endian spending and viewing scalars.
    Raw {
        spending: [u8; FIELD_BYTES],
        viewing: [u8; FIELD_BYTES],
    },
    Seed([u8; 32]),
    /// Signature over [`KEY_DERIVATION_MESSAGE`].
    WalletSignature(Vec<u8>),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            KeySource::Raw { .. } => "Raw",
            KeySource::Seed(_) => "Seed",
            KeySource::WalletSignature(_) => "WalletSignature",
        };
        write!(f, "KeySource::{kind}(<redacted>)")
    }
}

/// What a scanner holds: the viewing keypair plus the spending public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewingCapability {
    pub viewing: KeyPair,
    pub spending_pub: CurvePoint,
}

/// Public recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StealthMetaAddress {
    pub spending_pub: CurvePoint,
    pub viewing_pub: CurvePoint,
}

impl StealthMetaAddress {
    pub const ENCODED_LEN: usize = 2 * COMPRESSED_POINT_LEN;

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..COMPRESSED_POINT_LEN].copy_from_slice(self.spending_pub.compress().as_bytes());
        out[COMPRESSED_POINT_LEN..].copy_from_slice(self.viewing_pub.compress().as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(StealthError::InvalidLength {
                expected: Self::ENCODED_LEN,
                got: bytes.len(),
            });
        }
        let spending = CompressedPoint::from_slice(&bytes[..COMPRESSED_POINT_LEN])?;
        let viewing = CompressedPoint::from_slice(&bytes[COMPRESSED_POINT_LEN..])?;
        let address = Self {
            spending_pub: CurvePoint::decompress(&spending)?,
            viewing_pub: CurvePoint::decompress(&viewing)?,
        };
        if bool::from(address.spending_pub.is_identity() | address.viewing_pub.is_identity()) {
            return Err(StealthError::InvalidPoint("identity in meta-address"));
        }
        Ok(address)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for StealthMetaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for StealthMetaAddress {
    type Err = StealthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(s.trim_start_matches("0x"))?)
    }
}

impl Serialize for StealthMetaAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StealthMetaAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn derive_scalar(tag: &[u8], seed: &[u8]) -> Scalar {
    let digest = Sha256::new().chain_update(tag).chain_update(seed).finalize();
    Scalar::from_be_bytes_mod_order(&digest.into())
}
