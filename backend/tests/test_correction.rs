//! Supersede-and-resubmit correction workflow.

use bond_settlement_core_rs::ledger::{get_json, put_json};
use bond_settlement_core_rs::{
    Account, Asset, Bank, DayQueue, FixedClock, MemoryLedger, Owner, Security, SettlementEngine,
    TxStatus,
};

fn setup() -> SettlementEngine<MemoryLedger, FixedClock> {
    let mut store = MemoryLedger::new();
    for (account_id, bank_id) in [("004000000001", "BK004"), ("002000000001", "BK002")] {
        let mut account = Account::new(account_id, bank_id);
        let mut asset = Asset::new("A07103");
        asset.security_amount = 500_000;
        asset.balance = 1_000_000;
        asset.position = 1_000_000;
        asset.pending_balance = 1_000_000;
        account.assets.push(asset);
        put_json(&mut store, account_id, &account).unwrap();
        put_json(&mut store, bank_id, &Bank::new(bank_id)).unwrap();
    }
    let mut security = Security::new("A07103");
    for (account_id, bank_id) in [("004000000001", "BK004"), ("002000000001", "BK002")] {
        security.owners.push(Owner {
            account_id: account_id.to_string(),
            bank_id: bank_id.to_string(),
            owned_amount: 1_000_000,
            owned_balance: 0,
            created_at: String::new(),
            updated_at: String::new(),
        });
    }
    put_json(&mut store, "A07103", &security).unwrap();
    SettlementEngine::new(store, FixedClock::new("20180415070724"))
}

fn asset_of(engine: &SettlementEngine<MemoryLedger, FixedClock>, account_id: &str) -> Asset {
    let account: Account = get_json(engine.store(), account_id).unwrap().unwrap();
    account.asset("A07103").unwrap().clone()
}

#[test]
fn test_correction_supersedes_pending_original() {
    // Scenario: a Pending Sell with a mistyped payment is corrected.
    let mut engine = setup();
    let original = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "110000", "true")
        .unwrap();

    engine.clock_mut().set("20180415080000");
    let corrected = engine
        .security_correct_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "100000", "true",
            &original.tx_id,
        )
        .unwrap();

    assert_eq!(corrected.status, TxStatus::Pending);
    assert_eq!(corrected.correction_ref, original.tx_id);

    let original = engine.transaction(&original.tx_id).unwrap().unwrap();
    assert_eq!(original.status, TxStatus::Cancelled);
    assert_eq!(original.correction_ref, corrected.tx_id);
    assert_eq!(original.memo, "superseded by correction");

    // the erroneous reservation (110000) is released, the corrected
    // one (100000) remains
    assert_eq!(asset_of(&engine, "004000000001").pending_balance, 900_000);

    // day ledgers carry both records with their final statuses
    let queue = engine.day_queue("20180415").unwrap().unwrap();
    assert_eq!(queue.get(&original.tx_id).unwrap().status, TxStatus::Cancelled);
    assert_eq!(queue.get(&corrected.tx_id).unwrap().status, TxStatus::Pending);
    let history = engine.day_history("20180415").unwrap().unwrap();
    assert_eq!(
        history.get(&original.tx_id).unwrap().transaction.status,
        TxStatus::Cancelled
    );
}

#[test]
fn test_corrected_leg_matches_independently() {
    let mut engine = setup();
    let original = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "110000", "true")
        .unwrap();
    engine.clock_mut().set("20180415080000");
    let corrected = engine
        .security_correct_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "100000", "true",
            &original.tx_id,
        )
        .unwrap();

    engine.clock_mut().set("20180415081000");
    let buy = engine
        .security_transfer("B", "002000000001", "004000000001", "A07103", "102000", "100000", "true")
        .unwrap();

    assert_eq!(buy.status, TxStatus::Finished);
    assert_eq!(buy.matched_tx_id, corrected.tx_id);
    let corrected = engine.transaction(&corrected.tx_id).unwrap().unwrap();
    assert_eq!(corrected.status, TxStatus::Finished);
    // the superseded original never settles
    let original = engine.transaction(&original.tx_id).unwrap().unwrap();
    assert_eq!(original.status, TxStatus::Cancelled);

    assert_eq!(asset_of(&engine, "004000000001").balance, 900_000);
}

#[test]
fn test_correction_of_settled_record_is_rejected() {
    let mut engine = setup();
    let sell = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();
    engine.clock_mut().set("20180415080000");
    engine
        .security_transfer("B", "002000000001", "004000000001", "A07103", "102000", "100000", "true")
        .unwrap();

    engine.clock_mut().set("20180415081000");
    let attempt = engine
        .security_correct_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "99000", "true",
            &sell.tx_id,
        )
        .unwrap();

    assert_eq!(attempt.status, TxStatus::Cancelled);
    assert!(attempt.error_message.contains("only Pending"));
    // the settled original is untouched
    let sell = engine.transaction(&sell.tx_id).unwrap().unwrap();
    assert_eq!(sell.status, TxStatus::Finished);
    // the rejected attempt holds no reservation
    assert_eq!(asset_of(&engine, "004000000001").pending_balance, 800_000);
}

#[test]
fn test_correction_of_unknown_record_is_rejected() {
    let mut engine = setup();
    let attempt = engine
        .security_correct_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "100000", "true",
            "BK004S99900000000120180415000000",
        )
        .unwrap();
    assert_eq!(attempt.status, TxStatus::Cancelled);
    assert!(attempt.error_message.contains("not found"));
    assert_eq!(asset_of(&engine, "004000000001").pending_balance, 1_000_000);
}

#[test]
fn test_counterpart_queued_against_original_is_cancelled() {
    let mut engine = setup();
    let original = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "110000", "true")
        .unwrap();
    engine.clock_mut().set("20180415080000");
    let counterpart = engine
        .security_transfer("B", "002000000001", "004000000001", "A07103", "102000", "100000", "true")
        .unwrap();
    // short-index hit only; both Pending with a mismatch memo
    assert_eq!(counterpart.status, TxStatus::Pending);

    // the counterpart recorded the erroneous original as its correction
    // target
    let mut stored = engine.transaction(&counterpart.tx_id).unwrap().unwrap();
    stored.correction_ref = original.tx_id.clone();
    put_json(engine.store_mut(), &counterpart.tx_id, &stored).unwrap();
    let mut queue: DayQueue = get_json(engine.store(), "20180415").unwrap().unwrap();
    queue.get_mut(&counterpart.tx_id).unwrap().correction_ref = original.tx_id.clone();
    put_json(engine.store_mut(), "20180415", &queue).unwrap();

    engine.clock_mut().set("20180415081000");
    let corrected = engine
        .security_correct_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "100000", "true",
            &original.tx_id,
        )
        .unwrap();

    let counterpart = engine.transaction(&counterpart.tx_id).unwrap().unwrap();
    assert_eq!(counterpart.status, TxStatus::Cancelled);
    assert_eq!(counterpart.correction_ref, corrected.tx_id);
}
