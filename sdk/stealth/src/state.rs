//! Note Lifecycle
//!
//! Recipient-side view of each announcement:
//!
//! ```text
//! Unscanned ──scan──► ScannedMatch ──prepare──► ClaimPrepared ──ledger──► Claimed
//!     │                                           ▲   │
//!     └──scan──► ScannedNoMatch                   │   └──ledger──► ClaimRejected
//!                                                 └──────prepare──────────┘
//! ```
//!
//! Re-preparing a claim is allowed (it is deterministic); a rejected claim
//! may be prepared again by the caller. Nothing retries automatically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claim::ClaimWitness;
use crate::error::{Result, StealthError};
use crate::nullifier::NullifierHash;
use crate::scan::{ScanOutcome, ScannedNote};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    #[default]
    Unscanned,
    ScannedMatch,
    ScannedNoMatch,
    ClaimPrepared,
    Claimed,
    ClaimRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteEvent {
    ScanMatched,
    ScanMissed,
    ClaimPrepared,
    LedgerAccepted,
    LedgerRejected,
}

impl NoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteState::Unscanned => "unscanned",
            NoteState::ScannedMatch => "scanned_match",
            NoteState::ScannedNoMatch => "scanned_no_match",
            NoteState::ClaimPrepared => "claim_prepared",
            NoteState::Claimed => "claimed",
            NoteState::ClaimRejected => "claim_rejected",
        }
    }

    /// Next state, or `InvalidTransition`.
    pub fn apply(self, event: NoteEvent) -> Result<NoteState> {
        use NoteEvent as E;
        use NoteState as S;

        match (self, event) {
            (S::Unscanned, E::ScanMatched) => Ok(S::ScannedMatch),
            (S::Unscanned, E::ScanMissed) => Ok(S::ScannedNoMatch),
            (S::ScannedMatch | S::ClaimPrepared | S::ClaimRejected, E::ClaimPrepared) => {
                Ok(S::ClaimPrepared)
            }
            (S::ClaimPrepared, E::LedgerAccepted) => Ok(S::Claimed),
            (S::ClaimPrepared, E::LedgerRejected) => Ok(S::ClaimRejected),
            (from, event) => Err(StealthError::InvalidTransition {
                from: from.as_str(),
                event: event.as_str(),
            }),
        }
    }

    /// Matched and not yet claimed.
    pub fn is_spendable(&self) -> bool {
        matches!(
            self,
            NoteState::ScannedMatch | NoteState::ClaimPrepared | NoteState::ClaimRejected
        )
    }
}

impl fmt::Display for NoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NoteEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteEvent::ScanMatched => "scan_matched",
            NoteEvent::ScanMissed => "scan_missed",
            NoteEvent::ClaimPrepared => "claim_prepared",
            NoteEvent::LedgerAccepted => "ledger_accepted",
            NoteEvent::LedgerRejected => "ledger_rejected",
        }
    }
}

/// One tracked announcement.
#[derive(Debug, Clone, Default)]
pub struct NoteRecord {
    pub state: NoteState,
    pub note: Option<ScannedNote>,
    pub nullifier_hash: Option<NullifierHash>,
}

/// A recipient's notes, keyed by leaf index.
#[derive(Debug, Default)]
pub struct NoteBook {
    records: BTreeMap<u64, NoteRecord>,
}

impl NoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, leaf_index: u64) -> NoteState {
        self.records
            .get(&leaf_index)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    pub fn get(&self, leaf_index: u64) -> Option<&NoteRecord> {
        self.records.get(&leaf_index)
    }

    pub fn record_scan(&mut self, leaf_index: u64, outcome: &ScanOutcome) -> Result<NoteState> {
        let (event, note) = match outcome {
            ScanOutcome::Match(note) => (NoteEvent::ScanMatched, Some(*note)),
            ScanOutcome::NoMatch(_) => (NoteEvent::ScanMissed, None),
        };
        let state = self.transition(leaf_index, event)?;
        if let Some(record) = self.records.get_mut(&leaf_index) {
            record.note = note;
        }
        Ok(state)
    }

    pub fn record_claim_prepared(&mut self, witness: &ClaimWitness) -> Result<NoteState> {
        let leaf_index = witness.leaf_index();
        let state = self.transition(leaf_index, NoteEvent::ClaimPrepared)?;
        if let Some(record) = self.records.get_mut(&leaf_index) {
            record.nullifier_hash = Some(witness.nullifier_hash());
        }
        Ok(state)
    }

    pub fn record_ledger_result(&mut self, leaf_index: u64, accepted: bool) -> Result<NoteState> {
        let event = if accepted {
            NoteEvent::LedgerAccepted
        } else {
            NoteEvent::LedgerRejected
        };
        self.transition(leaf_index, event)
    }

    /// Matched notes that have not been claimed.
    pub fn spendable(&self) -> impl Iterator<Item = &ScannedNote> {
        self.records
            .values()
            .filter(|r| r.state.is_spendable())
            .filter_map(|r| r.note.as_ref())
    }

    pub fn spendable_balance(&self) -> u64 {
        self.spendable().map(|n| n.amount).sum()
    }

    fn transition(&mut self, leaf_index: u64, event: NoteEvent) -> Result<NoteState> {
        let record = self.records.entry(leaf_index).or_default();
        let next = record.state.apply(event)?;
        log::trace!("leaf {leaf_index}: {} -> {next}", record.state);
        record.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let s = NoteState::Unscanned
            .apply(NoteEvent::ScanMatched)
            .and_then(|s| s.apply(NoteEvent::ClaimPrepared))
            .and_then(|s| s.apply(NoteEvent::LedgerAccepted))
            .unwrap();
        assert_eq!(s, NoteState::Claimed);
    }

    #[test]
    fn test_retry_after_rejection() {
        let s = NoteState::ClaimPrepared.apply(NoteEvent::LedgerRejected).unwrap();
        assert_eq!(s, NoteState::ClaimRejected);
        assert_eq!(s.apply(NoteEvent::ClaimPrepared).unwrap(), NoteState::ClaimPrepared);
        assert_eq!(
            NoteState::ClaimPrepared.apply(NoteEvent::ClaimPrepared).unwrap(),
            NoteState::ClaimPrepared,
            "re-preparing is idempotent"
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let cases = [
            (NoteState::ScannedNoMatch, NoteEvent::ClaimPrepared),
            (NoteState::Unscanned, NoteEvent::ClaimPrepared),
            (NoteState::ScannedMatch, NoteEvent::LedgerAccepted),
            (NoteState::Claimed, NoteEvent::ClaimPrepared),
            (NoteState::ScannedMatch, NoteEvent::ScanMatched),
        ];
        for (from, event) in cases {
            assert!(
                matches!(from.apply(event), Err(StealthError::InvalidTransition { .. })),
                "{from} on {event:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_notebook_no_match_cannot_claim() {
        let mut book = NoteBook::new();
        book.record_scan(3, &ScanOutcome::NoMatch(StealthError::CommitmentMismatch))
            .unwrap();
        assert_eq!(book.state(3), NoteState::ScannedNoMatch);
        assert_eq!(book.state(4), NoteState::Unscanned);
        assert!(book.record_ledger_result(3, true).is_err());
        assert_eq!(book.spendable_balance(), 0);
    }
}
