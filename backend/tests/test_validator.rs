//! Submission validation through the engine surface.

use bond_settlement_core_rs::ledger::put_json;
use bond_settlement_core_rs::{
    Account, Asset, Bank, FixedClock, MemoryLedger, Owner, Security, SettlementEngine, TxStatus,
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
    let account: Account = bond_settlement_core_rs::ledger::get_json(engine.store(), account_id)
        .unwrap()
        .unwrap();
    account.asset("A07103").unwrap().clone()
}

#[test]
fn test_valid_submission_queues_as_pending() {
    let mut engine = setup();
    let tx = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();

    assert_eq!(tx.status, TxStatus::Pending);
    assert_eq!(tx.tx_id, "BK004S00400000000120180415070724");

    let queue = engine.day_queue("20180415").unwrap().unwrap();
    assert!(queue.contains(&tx.tx_id));
    let history = engine.day_history("20180415").unwrap().unwrap();
    assert!(history.get(&tx.tx_id).is_some());
}

#[test]
fn test_lowercase_input_is_normalized() {
    let mut engine = setup();
    let tx = engine
        .security_transfer("s", "004000000001", "002000000001", "a07103", "102000", "100000", "true")
        .unwrap();
    assert_eq!(tx.status, TxStatus::Pending);
    assert_eq!(tx.security_id, "A07103");
}

#[test]
fn test_insufficient_balance_persists_cancelled_record() {
    // Scenario: payment exceeds the seller's balance.
    let mut engine = setup();
    let tx = engine
        .security_transfer(
            "S", "004000000001", "002000000001", "A07103", "102000", "5000000", "true",
        )
        .unwrap();

    assert_eq!(tx.status, TxStatus::Cancelled);
    assert_eq!(tx.error_message, "insufficient balance");

    // record persisted for audit, but no aggregate mutated
    let stored = engine.transaction(&tx.tx_id).unwrap().unwrap();
    assert_eq!(stored.status, TxStatus::Cancelled);
    let seller = asset_of(&engine, "004000000001");
    assert_eq!(seller.balance, 1_000_000);
    assert_eq!(seller.pending_balance, 1_000_000);

    // rejected records never enter the matching queue
    let queue = engine.day_queue("20180415").unwrap().unwrap();
    assert!(!queue.contains(&tx.tx_id));
    let history = engine.day_history("20180415").unwrap().unwrap();
    assert!(history.get(&tx.tx_id).is_some());
}

#[test]
fn test_reservation_moves_pending_balance() {
    let mut engine = setup();
    engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();

    let seller = asset_of(&engine, "004000000001");
    let buyer = asset_of(&engine, "002000000001");
    assert_eq!(seller.pending_balance, 900_000);
    assert_eq!(buyer.pending_balance, 1_100_000);
    // transfer, not creation
    assert_eq!(seller.pending_balance + buyer.pending_balance, 2_000_000);
}

#[test]
fn test_unknown_security_rejected() {
    let mut engine = setup();
    let tx = engine
        .security_transfer("S", "004000000001", "002000000001", "Z99999", "102000", "100000", "true")
        .unwrap();
    assert_eq!(tx.status, TxStatus::Cancelled);
    assert!(tx.error_message.contains("Z99999"));
}

#[test]
fn test_unregistered_bank_rejected() {
    let mut engine = setup();
    let tx = engine
        .security_transfer("S", "777000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();
    assert_eq!(tx.status, TxStatus::Cancelled);
    assert!(tx.error_message.contains("BK777"));
}

#[test]
fn test_multibyte_account_id_persists_cancelled_record() {
    // A submission whose account id starts with multibyte characters
    // must come back as a Cancelled record, not a hard failure.
    let mut engine = setup();
    let tx = engine
        .security_transfer("S", "éé00", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();
    assert_eq!(tx.status, TxStatus::Cancelled);
    assert!(tx.error_message.contains("bank code"));

    let history = engine.day_history("20180415").unwrap().unwrap();
    assert!(history.get(&tx.tx_id).is_some());
}

#[test]
fn test_malformed_numeric_field_rejected() {
    let mut engine = setup();
    let tx = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "abc", "100000", "true")
        .unwrap();
    assert_eq!(tx.status, TxStatus::Cancelled);
    assert!(tx.error_message.contains("security amount"));
}

#[test]
fn test_duplicate_submission_same_second_is_rejected() {
    // The id is bank+type+account+timestamp, so the same account
    // resubmitting within one second collides in the day queue.
    let mut engine = setup();
    engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap();
    let err = engine
        .security_transfer("S", "004000000001", "002000000001", "A07103", "102000", "100000", "true")
        .unwrap_err();
    assert!(err.to_string().contains("already recorded"));
}

#[test]
fn test_invoke_dispatch_and_arity() {
    let mut engine = setup();
    let tx = engine
        .invoke(
            "securityTransfer",
            &["S", "004000000001", "002000000001", "A07103", "102000", "100000", "true"],
        )
        .unwrap();
    assert_eq!(tx.status, TxStatus::Pending);

    let err = engine.invoke("securityTransfer", &["S"]).unwrap_err();
    assert!(err.to_string().contains("7 arguments"));

    let err = engine.invoke("mintGold", &[]).unwrap_err();
    assert!(err.to_string().contains("unknown function"));
}
