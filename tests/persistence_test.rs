#![cfg(feature = "storage-rocksdb")]

use payflow::application::lifecycle::{InitializeRequest, LifecycleSettings, PaymentLifecycle};
use payflow::domain::payment::PaymentStatus;
use payflow::infrastructure::rocksdb::RocksDBStore;
use payflow::infrastructure::simulator::SimulatedGateway;
use serde_json::json;
use tempfile::tempdir;

fn lifecycle(store: RocksDBStore, gateway: SimulatedGateway) -> PaymentLifecycle {
    PaymentLifecycle::new(
        Box::new(store),
        Box::new(gateway),
        LifecycleSettings::default(),
    )
}

#[tokio::test]
async fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let gateway = SimulatedGateway::new();

    // 1. First run: initialize a payment
    let reference = {
        let store = RocksDBStore::open(&db_path).unwrap();
        let lifecycle = lifecycle(store, gateway.clone());
        let payment = lifecycle
            .initialize(InitializeRequest {
                amount: Some(json!(100)),
                user_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        payment.reference
    };

    // 2. Second run on the same path: the pending payment is still there and blocks u1
    let store = RocksDBStore::open(&db_path).unwrap();
    let lifecycle = lifecycle(store, gateway);
    let report = lifecycle.status(reference.as_str()).await.unwrap();
    assert_eq!(report.payment.status, PaymentStatus::Pending);

    let blocked = lifecycle
        .initialize(InitializeRequest {
            amount: Some(json!(50)),
            user_id: Some("u1".to_string()),
            ..Default::default()
        })
        .await;
    assert!(blocked.is_err());

    // 3. Verification settles it durably
    let paid = lifecycle.verify(Some(reference.as_str())).await.unwrap();
    assert_eq!(paid.status, PaymentStatus::Paid);
    let report = lifecycle.status(reference.as_str()).await.unwrap();
    assert_eq!(report.payment.paid_at, paid.paid_at);
}
