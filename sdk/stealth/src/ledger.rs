//! Announcement Ledger
//!
//! The ledger is external: it orders announcements, owns the accumulator and
//! enforces nullifier uniqueness. [`AnnouncementLedger`] is what this crate
//! needs from it; [`InMemoryLedger`] is a reference implementation used by
//! tests and local tooling.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use zelana_config::ZelanaConfig;

use crate::announcement::{Announcement, IndexedAnnouncement};
use crate::claim::ClaimProof;
use crate::error::Result;
use crate::hasher::FieldHasher;
use crate::merkle::{MerkleAccumulator, MerkleProof, RootHistory};
use crate::nullifier::NullifierHash;
use crate::params::Base;

/// Read access to a published announcement log.
pub trait AnnouncementLedger {
    fn announcement(&self, leaf_index: u64) -> Option<IndexedAnnouncement>;

    /// Announcements with `leaf_index >= start`, in order.
    fn announcements_since(&self, start: u64) -> Vec<IndexedAnnouncement>;

    fn current_root(&self) -> Base;

    /// Current or recent root.
    fn is_known_root(&self, root: &Base) -> bool;

    fn proof(&self, leaf_index: u64) -> Result<MerkleProof>;

    fn is_spent(&self, nullifier_hash: &NullifierHash) -> bool;
}

// ============================================================================
// Claim Submission
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownRoot,
    NullifierSpent,
    MalformedPublicInputs,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownRoot => write!(f, "root not in history"),
            RejectReason::NullifierSpent => write!(f, "nullifier already spent"),
            RejectReason::MalformedPublicInputs => write!(f, "malformed public inputs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Accepted,
    Rejected(RejectReason),
}

impl ClaimStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ClaimStatus::Accepted)
    }
}

// ============================================================================
// In-Memory Ledger
// ============================================================================

/// Append-only announcement log with its own accumulator and nullifier set.
///
/// Proof verification is out of scope here; a claim is accepted when its
/// root is recent and its nullifier hash is fresh.
pub struct InMemoryLedger {
    announcements: Vec<Announcement>,
    tree: MerkleAccumulator,
    root_history: RootHistory,
    spent: HashSet<NullifierHash>,
}

impl InMemoryLedger {
    pub fn new(depth: usize, history_size: usize, hasher: Arc<dyn FieldHasher>) -> Result<Self> {
        let tree = MerkleAccumulator::new(depth, hasher)?;
        let mut root_history = RootHistory::new(history_size);
        root_history.push(tree.root());
        Ok(Self {
            announcements: Vec::new(),
            tree,
            root_history,
            spent: HashSet::new(),
        })
    }

    /// Depth and history from `[protocol]`.
    pub fn from_config(config: &ZelanaConfig, hasher: Arc<dyn FieldHasher>) -> Result<Self> {
        Self::new(
            config.protocol.tree_depth,
            config.protocol.root_history_size,
            hasher,
        )
    }

    /// Append an announcement; its commitment becomes the next leaf.
    pub fn publish(&mut self, announcement: Announcement) -> Result<u64> {
        let leaf_index = self.tree.insert_commitment(&announcement.commitment)?;
        self.announcements.push(announcement);
        self.root_history.push(self.tree.root());
        log::debug!("Published announcement at leaf {leaf_index}");
        Ok(leaf_index)
    }

    /// Accept or reject a proven claim.
    pub fn submit_claim(&mut self, proof: &ClaimProof) -> ClaimStatus {
        let (root, nullifier_hash) = match (proof.merkle_root(), proof.nullifier_hash()) {
            (Ok(root), Ok(nh)) => (root, nh),
            _ => return self.reject(RejectReason::MalformedPublicInputs),
        };
        if !self.root_history.is_valid(&root) {
            return self.reject(RejectReason::UnknownRoot);
        }
        if !self.spent.insert(nullifier_hash) {
            return self.reject(RejectReason::NullifierSpent);
        }
        log::info!("Claim accepted ({} nullifiers spent)", self.spent.len());
        ClaimStatus::Accepted
    }

    pub fn len(&self) -> u64 {
        self.announcements.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    pub fn nullifier_count(&self) -> usize {
        self.spent.len()
    }

    fn reject(&self, reason: RejectReason) -> ClaimStatus {
        log::warn!("Claim rejected: {reason}");
        ClaimStatus::Rejected(reason)
    }
}

impl AnnouncementLedger for InMemoryLedger {
    fn announcement(&self, leaf_index: u64) -> Option<IndexedAnnouncement> {
        self.announcements
            .get(usize::try_from(leaf_index).ok()?)
            .map(|announcement| IndexedAnnouncement {
                leaf_index,
                announcement: *announcement,
            })
    }

    fn announcements_since(&self, start: u64) -> Vec<IndexedAnnouncement> {
        // a start past usize::MAX is past every stored announcement
        let Ok(start) = usize::try_from(start) else {
            return Vec::new();
        };
        self.announcements
            .iter()
            .enumerate()
            .skip(start)
            .map(|(i, announcement)| IndexedAnnouncement {
                leaf_index: i as u64,
                announcement: *announcement,
            })
            .collect()
    }

    fn current_root(&self) -> Base {
        self.tree.root()
    }

    fn is_known_root(&self, root: &Base) -> bool {
        self.root_history.is_valid(root)
    }

    fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        self.tree.proof(leaf_index)
    }

    fn is_spent(&self, nullifier_hash: &NullifierHash) -> bool {
        self.spent.contains(nullifier_hash)
    }
}
