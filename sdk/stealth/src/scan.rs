//! Scanning
//!
//! Viewing-key-only detection over published announcements.
//!
//! ```text
//! S      = v * ephemeralPub
//! amount = decrypt(encAmount, S)          reject 0 or > max
//! P      = K + H(S, domain) * G
//! match  iff commit(P.x, amount) == commitment
//! ```
//!
//! Every item is independent: a failure is recorded for that item and the
//! batch carries on. Batches run on rayon; output order is unspecified.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use zelana_config::{CommitmentToml, DomainToml, ZelanaConfig};

use crate::announcement::{IndexedAnnouncement, check_amount};
use crate::cipher::decrypt_amount;
use crate::commitment::{Commitment, CommitmentScheme};
use crate::curve::CurvePoint;
use crate::ecdh::ecdh;
use crate::error::{Result, StealthError};
use crate::hasher::FieldHasher;
use crate::keys::ViewingCapability;
use crate::params::{MAX_SUPPLY_SATS, Scalar};
use crate::stealth::{StealthDomain, stealth_pub};

/// A note found by scanning. Carries no spend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedNote {
    pub amount: u64,
    pub ephemeral_pub: CurvePoint,
    pub stealth_pub: CurvePoint,
    pub leaf_index: u64,
    pub commitment: Commitment,
}

/// Result of scanning one announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Match(ScannedNote),
    NoMatch(StealthError),
}

impl ScanOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, ScanOutcome::Match(_))
    }

    pub fn into_note(self) -> Option<ScannedNote> {
        match self {
            ScanOutcome::Match(note) => Some(note),
            ScanOutcome::NoMatch(_) => None,
        }
    }
}

/// Protocol settings a scan is evaluated under.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub hasher: &'a dyn FieldHasher,
    pub domain: StealthDomain,
    pub scheme: CommitmentScheme,
    pub max_amount: u64,
}

impl<'a> ScanContext<'a> {
    /// Transfer domain, two-input commitments, 21M BTC bound.
    pub fn new(hasher: &'a dyn FieldHasher) -> Self {
        Self {
            hasher,
            domain: StealthDomain::Transfer,
            scheme: CommitmentScheme::Transfer,
            max_amount: MAX_SUPPLY_SATS,
        }
    }
}

/// Scan one announcement with the viewing private key and spending public key.
pub fn scan(
    viewing_priv: &Scalar,
    spending_pub: &CurvePoint,
    item: &IndexedAnnouncement,
    ctx: &ScanContext<'_>,
) -> ScanOutcome {
    match try_scan(viewing_priv, spending_pub, item, ctx) {
        Ok(note) => {
            log::trace!("leaf {}: match", item.leaf_index);
            ScanOutcome::Match(note)
        }
        Err(e) => {
            log::trace!("leaf {}: no match ({e})", item.leaf_index);
            ScanOutcome::NoMatch(e)
        }
    }
}

fn try_scan(
    viewing_priv: &Scalar,
    spending_pub: &CurvePoint,
    item: &IndexedAnnouncement,
    ctx: &ScanContext<'_>,
) -> Result<ScannedNote> {
    let ann = &item.announcement;
    let shared = ecdh(viewing_priv, &ann.ephemeral_pub)?;

    let amount = decrypt_amount(&ann.encrypted_amount, &shared);
    check_amount(amount, ctx.max_amount)?;

    let one_time = stealth_pub(spending_pub, &shared, ctx.domain);
    if ctx.scheme.commit(ctx.hasher, &one_time, amount)? != ann.commitment {
        return Err(StealthError::CommitmentMismatch);
    }

    Ok(ScannedNote {
        amount,
        ephemeral_pub: ann.ephemeral_pub,
        stealth_pub: one_time,
        leaf_index: item.leaf_index,
        commitment: ann.commitment,
    })
}

/// Stealth domain selected by `[scan] domain`.
pub(crate) fn configured_domain(config: &ZelanaConfig) -> StealthDomain {
    match config.scan.domain {
        DomainToml::Transfer => StealthDomain::Transfer,
        DomainToml::YieldPool => StealthDomain::YieldPool,
    }
}

/// Commitment formula selected by `[scan] commitment` and `epoch`.
pub(crate) fn configured_scheme(config: &ZelanaConfig) -> CommitmentScheme {
    match config.scan.commitment {
        CommitmentToml::Transfer => CommitmentScheme::Transfer,
        CommitmentToml::Timelocked => CommitmentScheme::Timelocked {
            epoch: config.scan.epoch,
        },
    }
}

/// Batch scanner bound to one viewing capability.
pub struct Scanner {
    capability: ViewingCapability,
    hasher: Arc<dyn FieldHasher>,
    domain: StealthDomain,
    scheme: CommitmentScheme,
    max_amount: u64,
    pool: Option<rayon::ThreadPool>,
}

impl Scanner {
    pub fn new(capability: ViewingCapability, hasher: Arc<dyn FieldHasher>) -> Self {
        Self {
            capability,
            hasher,
            domain: StealthDomain::Transfer,
            scheme: CommitmentScheme::Transfer,
            max_amount: MAX_SUPPLY_SATS,
            pool: None,
        }
    }

    /// Settings from `[scan]` and `[protocol]`.
    pub fn from_config(
        capability: ViewingCapability,
        hasher: Arc<dyn FieldHasher>,
        config: &ZelanaConfig,
    ) -> Result<Self> {
        Self::new(capability, hasher)
            .with_domain(configured_domain(config))
            .with_scheme(configured_scheme(config))
            .with_max_amount(config.protocol.max_amount_sats)
            .with_worker_threads(config.scan.worker_threads)
    }

    pub fn with_domain(mut self, domain: StealthDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_scheme(mut self, scheme: CommitmentScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_max_amount(mut self, max_amount: u64) -> Self {
        self.max_amount = max_amount;
        self
    }

    /// Dedicated pool with `threads` workers; 0 keeps rayon's global pool.
    pub fn with_worker_threads(mut self, threads: usize) -> Result<Self> {
        if threads == 0 {
            self.pool = None;
            return Ok(self);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("zelana-scan-{i}"))
            .build()
            .map_err(|e| StealthError::WorkerPool(e.to_string()))?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn domain(&self) -> StealthDomain {
        self.domain
    }

    pub fn scheme(&self) -> CommitmentScheme {
        self.scheme
    }

    fn context(&self) -> ScanContext<'_> {
        ScanContext {
            hasher: self.hasher.as_ref(),
            domain: self.domain,
            scheme: self.scheme,
            max_amount: self.max_amount,
        }
    }

    pub fn scan_one(&self, item: &IndexedAnnouncement) -> ScanOutcome {
        scan(
            self.capability.viewing.private(),
            &self.capability.spending_pub,
            item,
            &self.context(),
        )
    }

    /// Outcome for every item, tagged with its leaf index.
    pub fn scan_batch_outcomes(&self, items: &[IndexedAnnouncement]) -> Vec<(u64, ScanOutcome)> {
        let run = || {
            items
                .par_iter()
                .map(|item| (item.leaf_index, self.scan_one(item)))
                .collect::<Vec<_>>()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        let matches = outcomes.iter().filter(|(_, o)| o.is_match()).count();
        log::debug!("Scanned {} announcements, {} matched", items.len(), matches);
        outcomes
    }

    /// Matching notes only.
    pub fn scan_batch(&self, items: &[IndexedAnnouncement]) -> Vec<ScannedNote> {
        self.scan_batch_outcomes(items)
            .into_iter()
            .filter_map(|(_, outcome)| outcome.into_note())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::{Announcement, TransferRequest};
    use crate::cipher::encrypt_amount;
    use crate::hasher::PoseidonHasher;
    use crate::keys::StealthKeys;

    fn hasher() -> Arc<dyn FieldHasher> {
        Arc::new(PoseidonHasher::new())
    }

    fn send(keys: &StealthKeys, amount: u64, eph: u64, leaf_index: u64) -> IndexedAnnouncement {
        let meta = keys.meta_address();
        let request = TransferRequest::new(&meta, amount);
        let announcement =
            Announcement::create_with_ephemeral(&request, &Scalar::from(eph), PoseidonHasher::shared())
                .unwrap();
        IndexedAnnouncement {
            leaf_index,
            announcement,
        }
    }

    #[test]
    fn test_scan_match() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let item = send(&keys, 100_000, 99, 0);
        let scanner = Scanner::new(keys.viewing_capability(), hasher());
        let note = scanner.scan_one(&item).into_note().expect("should match");
        assert_eq!(note.amount, 100_000);
        assert_eq!(note.leaf_index, 0);
        assert_eq!(note.commitment, item.announcement.commitment);
    }

    #[test]
    fn test_scan_other_recipient_no_match() {
        let alice = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let bob = StealthKeys::from_seed(&[2u8; 32]).unwrap();
        let item = send(&alice, 100_000, 99, 0);
        let scanner = Scanner::new(bob.viewing_capability(), hasher());
        assert!(!scanner.scan_one(&item).is_match());
    }

    #[test]
    fn test_scan_wrong_domain_or_scheme() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let item = send(&keys, 100_000, 5, 0);
        let yield_scanner =
            Scanner::new(keys.viewing_capability(), hasher()).with_domain(StealthDomain::YieldPool);
        assert_eq!(
            yield_scanner.scan_one(&item),
            ScanOutcome::NoMatch(StealthError::CommitmentMismatch)
        );
        let timelock_scanner = Scanner::new(keys.viewing_capability(), hasher())
            .with_scheme(CommitmentScheme::Timelocked { epoch: 1 });
        assert!(!timelock_scanner.scan_one(&item).is_match(), "no fallback formula");
    }

    #[test]
    fn test_scan_rejects_out_of_range_amount() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let mut item = send(&keys, 100_000, 5, 0);
        let shared = ecdh(keys.viewing.private(), &item.announcement.ephemeral_pub).unwrap();
        item.announcement.encrypted_amount = encrypt_amount(0, &shared);
        let scanner = Scanner::new(keys.viewing_capability(), hasher());
        assert!(matches!(
            scanner.scan_one(&item),
            ScanOutcome::NoMatch(StealthError::AmountOutOfRange { amount: 0, .. })
        ));

        item.announcement.encrypted_amount = encrypt_amount(MAX_SUPPLY_SATS + 1, &shared);
        assert!(matches!(
            scanner.scan_one(&item),
            ScanOutcome::NoMatch(StealthError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_scan_degenerate_ephemeral() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let mut item = send(&keys, 10, 5, 0);
        item.announcement.ephemeral_pub = CurvePoint::IDENTITY;
        let scanner = Scanner::new(keys.viewing_capability(), hasher());
        assert_eq!(
            scanner.scan_one(&item),
            ScanOutcome::NoMatch(StealthError::DegenerateSecret)
        );
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let alice = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let bob = StealthKeys::from_seed(&[2u8; 32]).unwrap();
        let mut items = Vec::new();
        for i in 0..12u64 {
            let owner = if i % 3 == 0 { &alice } else { &bob };
            items.push(send(owner, 1_000 + i, 100 + i, i));
        }
        items[3].announcement.ephemeral_pub = CurvePoint::IDENTITY;

        let scanner = Scanner::new(alice.viewing_capability(), hasher())
            .with_worker_threads(2)
            .unwrap();
        let mut found: Vec<u64> = scanner.scan_batch(&items).iter().map(|n| n.leaf_index).collect();
        found.sort_unstable();
        assert_eq!(found, vec![0, 6, 9], "corrupted item 3 is skipped, others found");
        assert_eq!(scanner.scan_batch_outcomes(&items).len(), 12);
    }

    #[test]
    fn test_from_config() {
        let keys = StealthKeys::from_seed(&[1u8; 32]).unwrap();
        let mut config = ZelanaConfig::default();
        config.scan.domain = DomainToml::YieldPool;
        config.scan.commitment = CommitmentToml::Timelocked;
        config.scan.epoch = 12;
        let scanner = Scanner::from_config(keys.viewing_capability(), hasher(), &config).unwrap();
        assert_eq!(scanner.domain(), StealthDomain::YieldPool);
        assert_eq!(scanner.scheme(), CommitmentScheme::Timelocked { epoch: 12 });
    }
}
