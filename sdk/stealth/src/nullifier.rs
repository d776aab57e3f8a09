//! Nullifiers
//!
//! ```text
//! nullifier     = H(stealthPriv mod p, leafIndex)     stays private
//! nullifierHash = H(nullifier)                        published at spend
//! ```
//!
//! Both are pure functions of the note, so re-deriving a claim always yields
//! the same nullifier hash and a second spend is caught by the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StealthError};
use crate::field::{FieldOps, serde_hex};
use crate::hasher::FieldHasher;
use crate::params::{Base, FIELD_BYTES, MAX_SAFE_LEAF_INDEX, Scalar};

/// Secret nullifier. Never published, never logged.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Nullifier(Base);

/// Public spend tag checked for uniqueness by the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NullifierHash(#[serde(with = "serde_hex")] Base);

impl Nullifier {
    /// Derive the nullifier of the note at `leaf_index`.
    pub fn derive(
        hasher: &dyn FieldHasher,
        stealth_priv: &Scalar,
        leaf_index: u64,
    ) -> Result<Self> {
        if leaf_index > MAX_SAFE_LEAF_INDEX {
            return Err(StealthError::LeafIndexOverflow(leaf_index));
        }
        let key = scalar_to_base(stealth_priv);
        Ok(Self(hasher.hash(&[key, Base::from(leaf_index)])?))
    }

    pub fn hash(&self, hasher: &dyn FieldHasher) -> Result<NullifierHash> {
        Ok(NullifierHash(hasher.hash(&[self.0])?))
    }

    pub fn to_field(&self) -> Base {
        self.0
    }
}

impl fmt::Debug for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nullifier(<redacted>)")
    }
}

impl NullifierHash {
    pub fn from_field(f: Base) -> Self {
        Self(f)
    }

    pub fn to_field(&self) -> Base {
        self.0
    }

    pub fn to_bytes(&self) -> [u8; FIELD_BYTES] {
        self.0.to_be32()
    }

    pub fn from_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        Ok(Self(Base::from_be32(bytes)?))
    }
}

impl fmt::Debug for NullifierHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NullifierHash({})", hex::encode(self.to_bytes()))
    }
}

/// Map a scalar (mod n) into the base field (mod p) via its big-endian bytes.
pub(crate) fn scalar_to_base(s: &Scalar) -> Base {
    Base::from_be_bytes_mod_order(&s.to_be32())
}
