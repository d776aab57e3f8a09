//! Protocol Parameters
//!
//! Fixed constants shared by every component. Nothing here is configurable:
//! the generator, curve coefficient and domain tags must agree bit-for-bit
//! with the claim circuit.
//!
//! ```text
//! Grumpkin:  y^2 = x^3 - 17
//!   base field   p = BN254 scalar field ([`Base`])
//!   group order  n = BN254 base field   ([`Scalar`])
//!   generator    G = (1, sqrt(-16))
//! ```

pub use crate::field::{Base, Scalar};

/// Curve coefficient `b` in `y^2 = x^3 + b`.
pub const COEFF_B: Base = Base::from_u64(17).neg();

/// Generator x-coordinate.
pub const GENERATOR_X: Base = Base::ONE;

/// Generator y-coordinate:
/// 17631683881184975370165255887551781615748388533673675138860.
pub const GENERATOR_Y: Base = Base::from_raw([
    0x833fc48d823f272c,
    0x2d270d45f1181294,
    0xcf135e7506a45d63,
    0x0000000000000002,
]);

/// Stealth scalar domain for ordinary shielded transfers.
pub const TRANSFER_DOMAIN_TAG: &[u8] = b"zelana-stealth-v1";

/// Stealth scalar domain for the yield pool. Never interchangeable with
/// [`TRANSFER_DOMAIN_TAG`].
pub const YIELD_POOL_DOMAIN_TAG: &[u8] = b"zelana-yield-stealth-v1";

/// Key derivation tags (seed -> spending / viewing scalar).
pub const SPENDING_KEY_TAG: &[u8] = b"zelana-stealth-spending-v1";
pub const VIEWING_KEY_TAG: &[u8] = b"zelana-stealth-viewing-v1";

/// Message a wallet signs once to derive its stealth keys.
pub const KEY_DERIVATION_MESSAGE: &[u8] =
    b"Zelana stealth key derivation v1. Signing this message does not authorize any transfer.";

/// Upper bound on any single amount: 21M BTC in satoshis.
pub const MAX_SUPPLY_SATS: u64 = 2_100_000_000_000_000;

/// Largest leaf index representable in the prover's witness encoding (2^53 - 1).
pub const MAX_SAFE_LEAF_INDEX: u64 = (1 << 53) - 1;

/// Reference depth of the commitment accumulator.
pub const TREE_DEPTH: usize = 20;

/// Number of recent roots a ledger keeps valid for claims.
pub const ROOT_HISTORY_SIZE: usize = 100;

/// Empty leaf value (`zeroHashes[0]`).
pub const EMPTY_LEAF: Base = Base::ZERO;

/// Compressed point length: sign byte + 32-byte x.
pub const COMPRESSED_POINT_LEN: usize = 33;

/// Field element / scalar length (big-endian).
pub const FIELD_BYTES: usize = 32;

/// Encrypted amount length.
pub const ENCRYPTED_AMOUNT_LEN: usize = 8;

/// Text prefix for exported announcements.
pub const ANNOUNCEMENT_TEXT_PREFIX: &str = "zelana";

/// Current text export version.
pub const ANNOUNCEMENT_TEXT_VERSION: u32 = 1;
