//! Field Hash Oracle
//!
//! Every commitment, nullifier and tree node is `H(inputs...)` over the
//! Grumpkin base field. The oracle sits behind [`FieldHasher`] so tests and
//! alternative circuits can swap it without touching callers.
//!
//! ```text
//! PoseidonHasher:  circom Poseidon over BN254 Fr, x^5 S-box
//!                  width = inputs + 1, no arity prefix
//!                  H(0, 0) = 0x2098f5fb...46b64864
//! ```
//!
//! The permutation runs on arkworks field elements and is not constant
//! time. Curve and key arithmetic never go through it; nullifier
//! derivation does.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher as CircomHasher};

use crate::error::{Result, StealthError};
use crate::field::FieldOps;
use crate::params::{Base, FIELD_BYTES};

/// Deterministic n-ary hash to a field element.
pub trait FieldHasher: Send + Sync {
    fn hash(&self, inputs: &[Base]) -> Result<Base>;

    fn hash2(&self, a: Base, b: Base) -> Result<Base> {
        self.hash(&[a, b])
    }
}

/// Widest input list the circom parameter set covers.
pub const MAX_POSEIDON_INPUTS: usize = 12;

/// circom-compatible Poseidon (BN254, x^5).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonHasher;

static SHARED_HASHER: PoseidonHasher = PoseidonHasher;

thread_local! {
    // round constants are parsed once per arity per thread
    static INSTANCES: RefCell<HashMap<usize, Poseidon<Fr>>> = RefCell::new(HashMap::new());
}

impl PoseidonHasher {
    pub fn new() -> Self {
        Self
    }

    /// Process-wide instance.
    pub fn shared() -> &'static PoseidonHasher {
        &SHARED_HASHER
    }
}

impl FieldHasher for PoseidonHasher {
    fn hash(&self, inputs: &[Base]) -> Result<Base> {
        if inputs.is_empty() || inputs.len() > MAX_POSEIDON_INPUTS {
            return Err(StealthError::Hash(format!(
                "poseidon takes 1..={MAX_POSEIDON_INPUTS} inputs, got {}",
                inputs.len()
            )));
        }
        let elements: Vec<Fr> = inputs
            .iter()
            .map(|x| Fr::from_be_bytes_mod_order(&x.to_be32()))
            .collect();

        let digest = INSTANCES.with(|cell| -> Result<Fr> {
            let mut instances = cell.borrow_mut();
            let poseidon = match instances.entry(inputs.len()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(
                    Poseidon::<Fr>::new_circom(inputs.len())
                        .map_err(|e| StealthError::Hash(e.to_string()))?,
                ),
            };
            poseidon
                .hash(&elements)
                .map_err(|e| StealthError::Hash(e.to_string()))
        })?;

        let mut out = [0u8; FIELD_BYTES];
        out.copy_from_slice(&digest.into_bigint().to_bytes_be());
        Base::from_be32(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(hex_be: &str) -> Base {
        Base::from_be_slice(&hex::decode(hex_be).unwrap()).unwrap()
    }

    #[test]
    fn test_hash_deterministic() {
        let h = PoseidonHasher::new();
        let a = Base::from(1u64);
        let b = Base::from(2u64);
        assert_eq!(h.hash(&[a, b]).unwrap(), h.hash(&[a, b]).unwrap());
        assert_eq!(h.hash2(a, b).unwrap(), h.hash(&[a, b]).unwrap());
        assert_eq!(
            PoseidonHasher::shared().hash(&[a, b]).unwrap(),
            h.hash(&[a, b]).unwrap(),
            "shared instance uses the same parameters"
        );
    }

    #[test]
    fn test_hash_matches_circom_vectors() {
        let h = PoseidonHasher::new();
        // poseidon([1, 2]) from circomlibjs
        assert_eq!(
            h.hash(&[Base::from(1u64), Base::from(2u64)]).unwrap(),
            base("115cc0f5e7d690413df64c6b9662e9cf2a3617f2743245519e19607a4417189a")
        );
        // poseidon([0, 0]), the first empty-subtree hash of a circom Merkle tree
        assert_eq!(
            h.hash2(Base::ZERO, Base::ZERO).unwrap(),
            base("2098f5fb9e239eab3ceac3f27b81e481dc3124d55ffed523a839ee8446b64864")
        );
    }

    #[test]
    fn test_hash_order_and_arity() {
        let h = PoseidonHasher::new();
        let a = Base::from(1u64);
        let b = Base::from(2u64);
        assert_ne!(h.hash(&[a, b]).unwrap(), h.hash(&[b, a]).unwrap(), "inputs are ordered");
        assert_ne!(
            h.hash(&[a]).unwrap(),
            h.hash(&[a, Base::ZERO]).unwrap(),
            "width depends on the number of inputs"
        );
    }

    #[test]
    fn test_hash_rejects_bad_arity() {
        let h = PoseidonHasher::new();
        assert!(matches!(h.hash(&[]), Err(StealthError::Hash(_))));
        let too_many = vec![Base::ONE; MAX_POSEIDON_INPUTS + 1];
        assert!(matches!(h.hash(&too_many), Err(StealthError::Hash(_))));
    }
}
