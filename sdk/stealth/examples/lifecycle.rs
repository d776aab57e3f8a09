//! Walks one stealth transfer from deposit to claim against the in-memory ledger.
//!
//! Run with `RUST_LOG=debug cargo run -p zelana-stealth --example lifecycle`.

use std::sync::Arc;

use zelana_config::ZelanaConfig;
use zelana_stealth::{
    Announcement, AnnouncementLedger, ClaimProof, FieldHasher, InMemoryLedger, PoseidonHasher,
    Scanner, StealthKeys, TransferRequest, prepare_claim,
};

fn main() -> anyhow::Result<()> {
    let config = ZelanaConfig::load()?;
    config.init_logging();

    let hasher: Arc<dyn FieldHasher> = Arc::new(PoseidonHasher::new());
    let mut rng = rand::thread_rng();

    let recipient = StealthKeys::random(&mut rng);
    let meta = recipient.meta_address();
    log::info!("Recipient meta-address: {meta}");

    // same domain, scheme and amount bound as the scanner below
    let request = TransferRequest::from_config(&meta, 100_000, &config);
    let announcement = Announcement::create(&request, hasher.as_ref(), &mut rng)?;
    log::info!("Announcement: {}", announcement.to_text()?);

    let mut ledger = InMemoryLedger::from_config(&config, hasher.clone())?;
    let leaf_index = ledger.publish(announcement)?;

    let scanner = Scanner::from_config(recipient.viewing_capability(), hasher.clone(), &config)?;
    let notes = scanner.scan_batch(&ledger.announcements_since(0));
    log::info!("Found {} note(s)", notes.len());

    for note in &notes {
        let proof = ledger.proof(note.leaf_index)?;
        let witness = prepare_claim(
            recipient.spending.private(),
            recipient.viewing.private(),
            note,
            &proof,
            scanner.domain(),
            hasher.as_ref(),
        )?;
        log::info!("Witness: {witness:?}");

        let claim = ClaimProof {
            proof: Vec::new(),
            public_inputs: witness.public_inputs(),
        };
        log::info!("Ledger says: {:?}", ledger.submit_claim(&claim));
    }

    log::info!("Leaf {leaf_index} processed");
    Ok(())
}
