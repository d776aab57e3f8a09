//! Commitment Accumulator
//!
//! Append-only incremental Merkle tree over commitment field elements.
//!
//! ```text
//!                      root
//!                    /      \
//!                 n1_0      n1_1 = zero[1]
//!                /    \
//!             C0      C1     zero[0] ...
//!
//! zero[0] = 0,  zero[i] = H(zero[i-1], zero[i-1])
//! frontier[L] = last completed left node at level L
//! ```
//!
//! Inserts are O(depth). Proofs for the newest leaf come straight from the
//! frontier; older leaves are served from the stored interior nodes. A proof
//! always recomputes to the root at the time it was taken; the caller keeps
//! old roots around (see [`RootHistory`]) if stale proofs must stay usable.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::{Result, StealthError};
use crate::field::serde_hex_vec;
use crate::hasher::{FieldHasher, PoseidonHasher};
use crate::params::{Base, EMPTY_LEAF, ROOT_HISTORY_SIZE, TREE_DEPTH};

const MAX_DEPTH: usize = 32;

/// Inclusion proof for one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: u64,
    /// Sibling hashes from leaf to root
    #[serde(with = "serde_hex_vec")]
    pub siblings: Vec<Base>,
    /// true when the path node is a right child
    pub path_indices: Vec<bool>,
    /// Root recomputed when the proof was taken
    #[serde(with = "crate::field::serde_hex")]
    pub root: Base,
}

impl MerkleProof {
    /// Fold `leaf` up the path.
    pub fn compute_root(&self, leaf: Base, hasher: &dyn FieldHasher) -> Result<Base> {
        self.siblings
            .iter()
            .zip(self.path_indices.iter())
            .try_fold(leaf, |current, (sibling, is_right)| {
                if *is_right {
                    hasher.hash2(*sibling, current)
                } else {
                    hasher.hash2(current, *sibling)
                }
            })
    }

    /// True when `leaf` folds to `root`.
    pub fn verify(&self, leaf: Base, root: Base, hasher: &dyn FieldHasher) -> bool {
        self.siblings.len() == self.path_indices.len()
            && self
                .compute_root(leaf, hasher)
                .is_ok_and(|computed| computed == root)
    }

    /// Like [`verify`](Self::verify) against the proof's own root, as an error.
    pub fn check(&self, leaf: Base, hasher: &dyn FieldHasher) -> Result<()> {
        if self.verify(leaf, self.root, hasher) {
            Ok(())
        } else {
            Err(StealthError::MerkleProofMismatch)
        }
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Incremental Merkle accumulator.
pub struct MerkleAccumulator {
    depth: usize,
    hasher: Arc<dyn FieldHasher>,
    /// nodes[L][i]: node i at level L (level 0 = leaves)
    nodes: Vec<Vec<Base>>,
    frontier: Vec<Base>,
    zero_hashes: Vec<Base>,
    root: Base,
}

impl MerkleAccumulator {
    pub fn new(depth: usize, hasher: Arc<dyn FieldHasher>) -> Result<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(StealthError::InvalidDepth(depth));
        }

        let mut zero_hashes = Vec::with_capacity(depth + 1);
        zero_hashes.push(EMPTY_LEAF);
        for level in 0..depth {
            let z = zero_hashes[level];
            zero_hashes.push(hasher.hash2(z, z)?);
        }

        log::info!("Merkle accumulator initialised (depth {depth})");
        Ok(Self::from_zero_hashes(depth, hasher, zero_hashes))
    }

    /// Reference depth with the default Poseidon oracle.
    pub fn with_default_hasher() -> Result<Self> {
        Self::new(TREE_DEPTH, Arc::new(PoseidonHasher::new()))
    }

    fn from_zero_hashes(depth: usize, hasher: Arc<dyn FieldHasher>, zero_hashes: Vec<Base>) -> Self {
        Self {
            depth,
            hasher,
            nodes: vec![Vec::new(); depth],
            frontier: zero_hashes[..depth].to_vec(),
            root: zero_hashes[depth],
            zero_hashes,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> Base {
        self.root
    }

    pub fn len(&self) -> u64 {
        self.nodes[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn zero_hash(&self, level: usize) -> Option<Base> {
        self.zero_hashes.get(level).copied()
    }

    pub fn frontier(&self) -> &[Base] {
        &self.frontier
    }

    pub fn leaf(&self, index: u64) -> Option<Base> {
        self.nodes[0].get(index as usize).copied()
    }

    pub fn hasher(&self) -> &dyn FieldHasher {
        self.hasher.as_ref()
    }

    /// Append a leaf and return its index.
    pub fn insert(&mut self, leaf: Base) -> Result<u64> {
        let index = self.len();
        if index >= self.capacity() {
            return Err(StealthError::TreeFull {
                capacity: self.capacity(),
            });
        }

        // hash the whole path before touching state so a failed hash leaves
        // the tree unchanged
        let mut path = Vec::with_capacity(self.depth);
        let mut current_index = index;
        let mut current = leaf;
        for level in 0..self.depth {
            path.push(current);
            current = if current_index % 2 == 0 {
                self.hasher.hash2(current, self.zero_hashes[level])?
            } else {
                self.hasher.hash2(self.frontier[level], current)?
            };
            current_index /= 2;
        }

        let mut current_index = index;
        for (level, node) in path.into_iter().enumerate() {
            self.set_node(level, current_index, node);
            if current_index % 2 == 0 {
                self.frontier[level] = node;
            }
            current_index /= 2;
        }

        self.root = current;
        log::debug!("Inserted leaf {index} (size {})", index + 1);
        Ok(index)
    }

    pub fn insert_commitment(&mut self, commitment: &Commitment) -> Result<u64> {
        self.insert(commitment.to_field())
    }

    /// Inclusion proof for `leaf_index` against the current root.
    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        let len = self.len();
        if leaf_index >= len {
            return Err(StealthError::LeafNotFound(leaf_index));
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let newest = leaf_index + 1 == len;
        let mut index = leaf_index;

        for level in 0..self.depth {
            let is_right = index & 1 == 1;
            let sibling = if newest {
                if is_right {
                    self.frontier[level]
                } else {
                    self.zero_hashes[level]
                }
            } else {
                self.nodes[level]
                    .get((index ^ 1) as usize)
                    .copied()
                    .unwrap_or(self.zero_hashes[level])
            };
            siblings.push(sibling);
            path_indices.push(is_right);
            index >>= 1;
        }

        let leaf = self.nodes[0][leaf_index as usize];
        let mut proof = MerkleProof {
            leaf_index,
            siblings,
            path_indices,
            root: self.root,
        };
        proof.root = proof.compute_root(leaf, self.hasher())?;
        Ok(proof)
    }

    fn set_node(&mut self, level: usize, index: u64, value: Base) {
        let row = &mut self.nodes[level];
        let index = index as usize;
        if index == row.len() {
            row.push(value);
        } else {
            row[index] = value;
        }
    }
}

/// Bounded window of recent roots (newest first).
#[derive(Debug, Clone)]
pub struct RootHistory {
    roots: VecDeque<Base>,
    max_size: usize,
}

impl RootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    pub fn push(&mut self, root: Base) {
        self.roots.push_front(root);
        if self.roots.len() > self.max_size {
            self.roots.pop_back();
        }
    }

    pub fn is_valid(&self, root: &Base) -> bool {
        self.roots.contains(root)
    }

    pub fn current(&self) -> Option<&Base> {
        self.roots.front()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl Default for RootHistory {
    fn default() -> Self {
        Self::new(ROOT_HISTORY_SIZE)
    }
}

/// Accumulator behind a reader/writer lock: inserts are exclusive, root and
/// proof reads run concurrently.
#[derive(Clone)]
pub struct SharedAccumulator {
    inner: Arc<RwLock<MerkleAccumulator>>,
}

impl SharedAccumulator {
    pub fn new(accumulator: MerkleAccumulator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(accumulator)),
        }
    }

    pub fn insert(&self, leaf: Base) -> Result<u64> {
        self.write().insert(leaf)
    }

    pub fn root(&self) -> Base {
        self.read().root()
    }

    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        self.read().proof(leaf_index)
    }

    pub fn len(&self) -> u64 {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, MerkleAccumulator> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MerkleAccumulator> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}
