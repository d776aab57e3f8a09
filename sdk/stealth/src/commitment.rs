//! Stealth Commitments
//!
//! ```text
//! Transfer:    C = H(stealthPub.x, amount)
//! Timelocked:  C = H(stealthPub.x, amount, epoch)
//! ```
//!
//! The scheme is always chosen by the caller. A note is only recognised under
//! the scheme it was created with.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::curve::CurvePoint;
use crate::error::Result;
use crate::field::{FieldOps, serde_hex};
use crate::hasher::FieldHasher;
use crate::params::{Base, FIELD_BYTES};

/// A published commitment (one accumulator leaf).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(#[serde(with = "serde_hex")] Base);

impl Commitment {
    pub fn from_field(f: Base) -> Self {
        Self(f)
    }

    pub fn to_field(&self) -> Base {
        self.0
    }

    /// 32-byte big-endian encoding.
    pub fn to_bytes(&self) -> [u8; FIELD_BYTES] {
        self.0.to_be32()
    }

    /// Strict decoding; rejects values outside the field.
    pub fn from_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self> {
        Ok(Self(Base::from_be32(bytes)?))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.to_bytes()))
    }
}

/// Commitment formula version, tied to a claim circuit generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitmentScheme {
    /// Two-input form for ordinary transfers.
    #[default]
    Transfer,
    /// Three-input form for time-locked / yield positions.
    Timelocked { epoch: u64 },
}

impl CommitmentScheme {
    pub fn commit(
        &self,
        hasher: &dyn FieldHasher,
        stealth_pub: &CurvePoint,
        amount: u64,
    ) -> Result<Commitment> {
        let x = stealth_pub.x();
        let amount = Base::from(amount);
        let digest = match self {
            CommitmentScheme::Transfer => hasher.hash(&[x, amount])?,
            CommitmentScheme::Timelocked { epoch } => {
                hasher.hash(&[x, amount, Base::from(*epoch)])?
            }
        };
        Ok(Commitment(digest))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommitmentScheme::Transfer => "transfer",
            CommitmentScheme::Timelocked { .. } => "timelocked",
        }
    }
}
