//! Claim Preparation
//!
//! Turns a scanned note into the witness the claim circuit proves over.
//! Requires the spending key.
//!
//! ```text
//!   private: stealthPriv, amount, leafIndex, merklePath, merkleIndices
//!   public:  merkleRoot, nullifierHash, amount
//! ```
//!
//! Preparation is deterministic: the same note always yields the same
//! nullifier hash, so a second claim is caught by the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::curve::CurvePoint;
use crate::ecdh::ecdh;
use crate::error::{Result, StealthError};
use crate::field::{FieldOps, serde_hex_vec};
use crate::hasher::FieldHasher;
use crate::merkle::MerkleProof;
use crate::nullifier::{Nullifier, NullifierHash};
use crate::params::{Base, MAX_SAFE_LEAF_INDEX, Scalar};
use crate::scan::ScannedNote;
use crate::stealth::{StealthDomain, stealth_priv};

/// Witness for one claim. Secret fields are redacted from Debug.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimWitness {
    stealth_priv: Scalar,
    amount: u64,
    leaf_index: u64,
    merkle_path: Vec<Base>,
    merkle_indices: Vec<bool>,
    merkle_root: Base,
    nullifier: Nullifier,
    nullifier_hash: NullifierHash,
}

impl ClaimWitness {
    pub fn stealth_priv(&self) -> &Scalar {
        &self.stealth_priv
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn leaf_index(&self) -> u64 {
        self.leaf_index
    }

    pub fn merkle_path(&self) -> &[Base] {
        &self.merkle_path
    }

    pub fn merkle_indices(&self) -> &[bool] {
        &self.merkle_indices
    }

    pub fn merkle_root(&self) -> Base {
        self.merkle_root
    }

    pub fn nullifier(&self) -> &Nullifier {
        &self.nullifier
    }

    pub fn nullifier_hash(&self) -> NullifierHash {
        self.nullifier_hash
    }

    /// `[merkleRoot, nullifierHash, amount]`
    pub fn public_inputs(&self) -> Vec<Base> {
        vec![
            self.merkle_root,
            self.nullifier_hash.to_field(),
            Base::from(self.amount),
        ]
    }

    /// Hex-encoded witness for external provers.
    pub fn prover_inputs(&self) -> ProverInputs {
        ProverInputs {
            stealth_priv: hex::encode(self.stealth_priv.to_be32()),
            amount: self.amount,
            leaf_index: self.leaf_index,
            merkle_path: self.merkle_path.iter().map(|s| hex::encode(s.to_be32())).collect(),
            merkle_indices: self.merkle_indices.iter().map(|b| *b as u8).collect(),
            merkle_root: hex::encode(self.merkle_root.to_be32()),
            nullifier_hash: hex::encode(self.nullifier_hash.to_bytes()),
        }
    }
}

impl fmt::Debug for ClaimWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimWitness")
            .field("stealth_priv", &"<redacted>")
            .field("amount", &self.amount)
            .field("leaf_index", &self.leaf_index)
            .field("depth", &self.merkle_path.len())
            .field("nullifier_hash", &self.nullifier_hash)
            .finish()
    }
}

/// Serialized witness in the shape circuit tooling expects.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverInputs {
    pub stealth_priv: String,
    pub amount: u64,
    pub leaf_index: u64,
    pub merkle_path: Vec<String>,
    pub merkle_indices: Vec<u8>,
    pub merkle_root: String,
    pub nullifier_hash: String,
}

impl fmt::Debug for ProverInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProverInputs")
            .field("stealth_priv", &"<redacted>")
            .field("amount", &self.amount)
            .field("leaf_index", &self.leaf_index)
            .field("merkle_root", &self.merkle_root)
            .field("nullifier_hash", &self.nullifier_hash)
            .finish()
    }
}

/// Opaque proof plus its public inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProof {
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    #[serde(with = "serde_hex_vec")]
    pub public_inputs: Vec<Base>,
}

impl ClaimProof {
    pub fn merkle_root(&self) -> Result<Base> {
        self.public_input(0)
    }

    pub fn nullifier_hash(&self) -> Result<NullifierHash> {
        self.public_input(1).map(NullifierHash::from_field)
    }

    pub fn amount(&self) -> Result<Base> {
        self.public_input(2)
    }

    fn public_input(&self, i: usize) -> Result<Base> {
        self.public_inputs
            .get(i)
            .copied()
            .ok_or(StealthError::InvalidLength {
                expected: 3,
                got: self.public_inputs.len(),
            })
    }
}

/// External zero-knowledge prover.
pub trait ClaimProver {
    type Error: std::error::Error;

    fn prove(&self, witness: &ClaimWitness) -> std::result::Result<ClaimProof, Self::Error>;
}

/// Derive the claim witness for `note`.
///
/// Fails with [`StealthError::StealthKeyMismatch`] if the keys do not own the
/// note and [`StealthError::MerkleProofMismatch`] if `proof` does not place the
/// note's commitment under `proof.root`.
pub fn prepare_claim(
    spending_priv: &Scalar,
    viewing_priv: &Scalar,
    note: &ScannedNote,
    proof: &MerkleProof,
    domain: StealthDomain,
    hasher: &dyn FieldHasher,
) -> Result<ClaimWitness> {
    if note.leaf_index > MAX_SAFE_LEAF_INDEX {
        return Err(StealthError::LeafIndexOverflow(note.leaf_index));
    }

    let shared = ecdh(viewing_priv, &note.ephemeral_pub)?;
    let one_time_priv = stealth_priv(spending_priv, &shared, domain);
    if CurvePoint::mul_generator(&one_time_priv) != note.stealth_pub {
        log::warn!("Stealth key mismatch for leaf {}", note.leaf_index);
        return Err(StealthError::StealthKeyMismatch);
    }

    if proof.leaf_index != note.leaf_index {
        return Err(StealthError::MerkleProofMismatch);
    }
    proof.check(note.commitment.to_field(), hasher)?;

    let nullifier = Nullifier::derive(hasher, &one_time_priv, note.leaf_index)?;
    let nullifier_hash = nullifier.hash(hasher)?;
    log::debug!("Prepared claim for leaf {}", note.leaf_index);

    Ok(ClaimWitness {
        stealth_priv: one_time_priv,
        amount: note.amount,
        leaf_index: note.leaf_index,
        merkle_path: proof.siblings.clone(),
        merkle_indices: proof.path_indices.clone(),
        merkle_root: proof.root,
        nullifier,
        nullifier_hash,
    })
}
