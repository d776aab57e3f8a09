//! Announcements
//!
//! The only data a transfer publishes:
//!
//! ```text
//! ┌────────────────────┬──────────────────┬───────────────────┐
//! │ ephemeralPub (33)  │ commitment (32)  │ encAmount (8, LE) │
//! └────────────────────┴──────────────────┴───────────────────┘
//! ```
//!
//! The sender's ephemeral scalar lives only inside [`Announcement::create`].
//! Self-custody hand-off uses the text form `zelana:1:<base64url(json)>`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zelana_config::ZelanaConfig;

use crate::cipher::{EncryptedAmount, encrypt_amount};
use crate::commitment::{Commitment, CommitmentScheme};
use crate::curve::{CompressedPoint, CurvePoint};
use crate::ecdh::ecdh;
use crate::error::{Result, StealthError};
use crate::hasher::FieldHasher;
use crate::keys::StealthMetaAddress;
use crate::params::{
    ANNOUNCEMENT_TEXT_PREFIX, ANNOUNCEMENT_TEXT_VERSION, COMPRESSED_POINT_LEN,
    ENCRYPTED_AMOUNT_LEN, FIELD_BYTES, MAX_SUPPLY_SATS, Scalar,
};
use crate::scan::{configured_domain, configured_scheme};
use crate::stealth::{StealthDomain, stealth_pub};

/// Published record for one stealth transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub ephemeral_pub: CurvePoint,
    pub commitment: Commitment,
    #[serde(with = "hex::serde")]
    pub encrypted_amount: EncryptedAmount,
}

/// An announcement at its accumulator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedAnnouncement {
    pub leaf_index: u64,
    pub announcement: Announcement,
}

/// Everything needed to build an announcement, minus the randomness.
///
/// `max_amount` must match the recipient's scanner bound: a note above the
/// scanner's bound is never found.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub recipient: &'a StealthMetaAddress,
    pub amount: u64,
    pub scheme: CommitmentScheme,
    pub domain: StealthDomain,
    pub max_amount: u64,
}

impl<'a> TransferRequest<'a> {
    /// Ordinary transfer bounded by the total supply.
    pub fn new(recipient: &'a StealthMetaAddress, amount: u64) -> Self {
        Self {
            recipient,
            amount,
            scheme: CommitmentScheme::Transfer,
            domain: StealthDomain::Transfer,
            max_amount: MAX_SUPPLY_SATS,
        }
    }

    /// Domain, scheme and amount bound from the same config a scanner uses.
    pub fn from_config(
        recipient: &'a StealthMetaAddress,
        amount: u64,
        config: &ZelanaConfig,
    ) -> Self {
        Self::new(recipient, amount)
            .with_domain(configured_domain(config))
            .with_scheme(configured_scheme(config))
            .with_max_amount(config.protocol.max_amount_sats)
    }

    pub fn with_scheme(mut self, scheme: CommitmentScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_domain(mut self, domain: StealthDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_max_amount(mut self, max_amount: u64) -> Self {
        self.max_amount = max_amount;
        self
    }
}

impl Announcement {
    pub const ENCODED_LEN: usize = COMPRESSED_POINT_LEN + FIELD_BYTES + ENCRYPTED_AMOUNT_LEN;

    /// Sender side: draw a fresh ephemeral key and build the announcement.
    pub fn create<R: RngCore + CryptoRng>(
        request: &TransferRequest<'_>,
        hasher: &dyn FieldHasher,
        rng: &mut R,
    ) -> Result<Self> {
        let ephemeral = loop {
            let k = Scalar::random(&mut *rng);
            if !bool::from(k.is_zero()) {
                break k;
            }
        };
        Self::create_with_ephemeral(request, &ephemeral, hasher)
    }

    /// Deterministic construction from a caller-chosen ephemeral scalar.
    pub fn create_with_ephemeral(
        request: &TransferRequest<'_>,
        ephemeral: &Scalar,
        hasher: &dyn FieldHasher,
    ) -> Result<Self> {
        check_amount(request.amount, request.max_amount)?;
        if bool::from(ephemeral.is_zero()) {
            return Err(StealthError::InvalidScalar("zero ephemeral key"));
        }

        let recipient = request.recipient;
        let shared = ecdh(ephemeral, &recipient.viewing_pub)?;
        let one_time = stealth_pub(&recipient.spending_pub, &shared, request.domain);

        Ok(Self {
            ephemeral_pub: CurvePoint::mul_generator(ephemeral),
            commitment: request.scheme.commit(hasher, &one_time, request.amount)?,
            encrypted_amount: encrypt_amount(request.amount, &shared),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        let (point, rest) = out.split_at_mut(COMPRESSED_POINT_LEN);
        let (commitment, amount) = rest.split_at_mut(FIELD_BYTES);
        point.copy_from_slice(self.ephemeral_pub.compress().as_bytes());
        commitment.copy_from_slice(&self.commitment.to_bytes());
        amount.copy_from_slice(&self.encrypted_amount);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(StealthError::InvalidLength {
                expected: Self::ENCODED_LEN,
                got: bytes.len(),
            });
        }
        let (point, rest) = bytes.split_at(COMPRESSED_POINT_LEN);
        let (commitment, amount) = rest.split_at(FIELD_BYTES);

        let mut commitment_bytes = [0u8; FIELD_BYTES];
        commitment_bytes.copy_from_slice(commitment);
        let mut encrypted_amount = [0u8; ENCRYPTED_AMOUNT_LEN];
        encrypted_amount.copy_from_slice(amount);

        Ok(Self {
            ephemeral_pub: CurvePoint::decompress(&CompressedPoint::from_slice(point)?)?,
            commitment: Commitment::from_bytes(&commitment_bytes)?,
            encrypted_amount,
        })
    }

    /// `zelana:1:<base64url(json)>`
    pub fn to_text(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!(
            "{ANNOUNCEMENT_TEXT_PREFIX}:{ANNOUNCEMENT_TEXT_VERSION}:{}",
            URL_SAFE_NO_PAD.encode(json)
        ))
    }

    pub fn from_text(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(3, ':');
        let (Some(prefix), Some(version), Some(payload)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(StealthError::Encoding("expected prefix:version:payload".into()));
        };
        if prefix != ANNOUNCEMENT_TEXT_PREFIX {
            return Err(StealthError::Encoding(format!("unknown prefix: {prefix}")));
        }
        if version.parse::<u32>().ok() != Some(ANNOUNCEMENT_TEXT_VERSION) {
            return Err(StealthError::Encoding(format!("unsupported version: {version}")));
        }
        let json = URL_SAFE_NO_PAD.decode(payload)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// `0 < amount <= max`
pub(crate) fn check_amount(amount: u64, max: u64) -> Result<()> {
    if amount == 0 || amount > max {
        return Err(StealthError::AmountOutOfRange { amount, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::decrypt_amount;
    use crate::hasher::PoseidonHasher;
    use crate::keys::StealthKeys;
    use crate::scan::Scanner;
    use rand::{SeedableRng, rngs::StdRng};
    use std::sync::Arc;

    fn sample(rng: &mut impl RngCore) -> (StealthKeys, Announcement) {
        let keys = StealthKeys::from_seed(&[rng.next_u32() as u8; 32]).unwrap();
        let meta = keys.meta_address();
        let request = TransferRequest::new(&meta, 100_000);
        let ann =
            Announcement::create_with_ephemeral(&request, &Scalar::from(77u64), PoseidonHasher::shared())
                .unwrap();
        (keys, ann)
    }

    #[test]
    fn test_create_recipient_can_decrypt() {
        let mut rng = StdRng::seed_from_u64(41);
        let (keys, ann) = sample(&mut rng);
        let shared = ecdh(keys.viewing.private(), &ann.ephemeral_pub).unwrap();
        assert_eq!(decrypt_amount(&ann.encrypted_amount, &shared), 100_000);
    }

    #[test]
    fn test_create_random_ephemeral_differs() {
        let mut rng = StdRng::seed_from_u64(42);
        let keys = StealthKeys::random(&mut rng);
        let meta = keys.meta_address();
        let request = TransferRequest::new(&meta, 5);
        let h = PoseidonHasher::shared();
        let a = Announcement::create(&request, h, &mut rng).unwrap();
        let b = Announcement::create(&request, h, &mut rng).unwrap();
        assert_ne!(a.ephemeral_pub, b.ephemeral_pub, "fresh ephemeral per transfer");
        assert_ne!(a.commitment, b.commitment, "one-time keys must not repeat");
    }

    #[test]
    fn test_amount_bounds() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let meta = keys.meta_address();
        for amount in [0, MAX_SUPPLY_SATS + 1] {
            let request = TransferRequest::new(&meta, amount);
            assert!(matches!(
                Announcement::create_with_ephemeral(
                    &request,
                    &Scalar::from(3u64),
                    PoseidonHasher::shared()
                ),
                Err(StealthError::AmountOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_sender_and_scanner_share_configured_bound() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let meta = keys.meta_address();
        let h = PoseidonHasher::shared();
        let mut config = ZelanaConfig::default();
        config.protocol.max_amount_sats = 1_000;

        let over = TransferRequest::from_config(&meta, 1_001, &config);
        assert_eq!(over.max_amount, 1_000);
        assert_eq!(
            Announcement::create_with_ephemeral(&over, &Scalar::from(3u64), h),
            Err(StealthError::AmountOutOfRange {
                amount: 1_001,
                max: 1_000
            }),
            "sender must refuse what the scanner would drop"
        );

        let within = TransferRequest::from_config(&meta, 1_000, &config);
        let ann = Announcement::create_with_ephemeral(&within, &Scalar::from(3u64), h).unwrap();
        let scanner =
            Scanner::from_config(keys.viewing_capability(), Arc::new(PoseidonHasher::new()), &config)
                .unwrap();
        let item = IndexedAnnouncement {
            leaf_index: 0,
            announcement: ann,
        };
        assert_eq!(
            scanner.scan_one(&item).into_note().map(|n| n.amount),
            Some(1_000),
            "anything the sender accepts the scanner finds"
        );
    }

    #[test]
    fn test_request_builders() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let meta = keys.meta_address();
        let request = TransferRequest::new(&meta, 10)
            .with_domain(StealthDomain::YieldPool)
            .with_scheme(CommitmentScheme::Timelocked { epoch: 4 })
            .with_max_amount(50);
        assert_eq!(request.domain, StealthDomain::YieldPool);
        assert_eq!(request.scheme, CommitmentScheme::Timelocked { epoch: 4 });
        assert_eq!(request.max_amount, 50);
        assert_eq!(TransferRequest::new(&meta, 10).max_amount, MAX_SUPPLY_SATS);
    }

    #[test]
    fn test_binary_encoding() {
        let mut rng = StdRng::seed_from_u64(43);
        let (_, ann) = sample(&mut rng);
        let bytes = ann.to_bytes();
        assert_eq!(bytes.len(), 73);
        assert_eq!(&bytes[65..], &ann.encrypted_amount);
        assert_eq!(Announcement::from_bytes(&bytes).unwrap(), ann);
        assert!(matches!(
            Announcement::from_bytes(&bytes[..72]),
            Err(StealthError::InvalidLength { expected: 73, got: 72 })
        ));
    }

    #[test]
    fn test_text_export() {
        let mut rng = StdRng::seed_from_u64(44);
        let (_, ann) = sample(&mut rng);
        let text = ann.to_text().unwrap();
        assert!(text.starts_with("zelana:1:"));
        assert_eq!(Announcement::from_text(&text).unwrap(), ann);

        let wrong_version = text.replacen("zelana:1:", "zelana:2:", 1);
        assert!(matches!(
            Announcement::from_text(&wrong_version),
            Err(StealthError::Encoding(_))
        ));
        assert!(Announcement::from_text("zvault:1:abc").is_err());
        assert!(Announcement::from_text("garbage").is_err());
    }
}
