//! Zelana Stealth SDK
//!
//! Stealth-address transfers on the Grumpkin curve: a sender pays a one-time
//! key derived from the recipient's public meta-address; the recipient finds
//! it with a viewing key and spends it with a spending key.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── sender ─────────────────────────┐
//! │  r ← random        S = r·V        P = K + H(S, tag)·G      │
//! │  Announcement { R = r·G, C = H(P.x, amount), amount ⊕ k } │
//! └──────────────────────────────┬───────────────────────────┘
//!                                ▼  ledger appends C to the accumulator
//! ┌──────────────────────── recipient ───────────────────────┐
//! │  scan (viewing key):   S = v·R → amount → P → check C     │
//! │  claim (spending key): p = k + H(S, tag), p·G == P        │
//! │                        nullifierHash = H(H(p, leafIndex)) │
//! │                        witness ──► external prover        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Field, scalar and curve arithmetic run in constant time with respect to
//! secret values. The Poseidon oracle ([`hasher`]) does not, and nullifier
//! derivation passes it the stealth private key.

pub mod announcement;
pub mod cipher;
pub mod claim;
pub mod commitment;
pub mod curve;
pub mod ecdh;
pub mod error;
pub mod field;
pub mod hasher;
pub mod keys;
pub mod ledger;
pub mod merkle;
pub mod nullifier;
pub mod params;
pub mod scan;
pub mod state;
pub mod stealth;

pub use announcement::{Announcement, IndexedAnnouncement, TransferRequest};
pub use cipher::{EncryptedAmount, decrypt_amount, encrypt_amount};
pub use claim::{ClaimProof, ClaimProver, ClaimWitness, ProverInputs, prepare_claim};
pub use commitment::{Commitment, CommitmentScheme};
pub use curve::{CompressedPoint, CurvePoint};
pub use ecdh::{SharedSecret, ecdh};
pub use error::{Result, StealthError};
pub use field::{FieldOps, serde_hex};
pub use hasher::{FieldHasher, MAX_POSEIDON_INPUTS, PoseidonHasher};
pub use keys::{KeyPair, KeySource, StealthKeys, StealthMetaAddress, ViewingCapability};
pub use ledger::{AnnouncementLedger, ClaimStatus, InMemoryLedger, RejectReason};
pub use merkle::{MerkleAccumulator, MerkleProof, RootHistory, SharedAccumulator};
pub use nullifier::{Nullifier, NullifierHash};
pub use params::{Base, MAX_SUPPLY_SATS, Scalar, TREE_DEPTH};
pub use scan::{ScanContext, ScanOutcome, ScannedNote, Scanner, scan};
pub use state::{NoteBook, NoteEvent, NoteState};
pub use stealth::{StealthDomain, stealth_priv, stealth_pub, stealth_scalar};
