//! Stealth protocol errors.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StealthError {
    #[error("invalid curve point: {0}")]
    InvalidPoint(&'static str),

    #[error("ECDH produced the identity point")]
    DegenerateSecret,

    #[error("amount {amount} outside (0, {max}]")]
    AmountOutOfRange { amount: u64, max: u64 },

    #[error("commitment does not match announcement")]
    CommitmentMismatch,

    #[error("derived stealth key does not match note")]
    StealthKeyMismatch,

    #[error("merkle proof does not verify against root")]
    MerkleProofMismatch,

    #[error("leaf index {0} exceeds the safe integer range")]
    LeafIndexOverflow(u64),

    #[error("invalid scalar: {0}")]
    InvalidScalar(&'static str),

    #[error("non-canonical field encoding")]
    NonCanonicalEncoding,

    #[error("invalid length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("accumulator depth {0} outside 1..=32")]
    InvalidDepth(usize),

    #[error("accumulator full ({capacity} leaves)")]
    TreeFull { capacity: u64 },

    #[error("leaf {0} not in accumulator")]
    LeafNotFound(u64),

    #[error("invalid note transition from {from} on {event}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("hash oracle: {0}")]
    Hash(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("scan worker pool: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, StealthError>;

impl From<hex::FromHexError> for StealthError {
    fn from(e: hex::FromHexError) -> Self {
        StealthError::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for StealthError {
    fn from(e: base64::DecodeError) -> Self {
        StealthError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for StealthError {
    fn from(e: serde_json::Error) -> Self {
        StealthError::Encoding(e.to_string())
    }
}
