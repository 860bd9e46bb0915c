use chrono::{TimeDelta, Utc};
use payflow::domain::metadata::Metadata;
use payflow::domain::payment::{Amount, NewPayment, PaymentRequest};
use payflow::domain::ports::{InsertOutcome, PaymentGatewayBox, PaymentStoreBox};
use payflow::domain::reference::Reference;
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use payflow::infrastructure::simulator::SimulatedGateway;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let store: PaymentStoreBox = Box::new(InMemoryPaymentStore::new());
    let gateway: PaymentGatewayBox = Box::new(SimulatedGateway::new());

    let now = Utc::now();
    let payment = PaymentRequest::pending(
        NewPayment {
            reference: Reference::parse("DYN-1").unwrap(),
            amount: Amount::new(dec!(100.0)).unwrap(),
            currency: "KES".to_string(),
            user_id: "u1".to_string(),
            email: "a@b.com".to_string(),
            phone: None,
            description: String::new(),
            authorization_url: None,
            access_code: None,
            metadata: Metadata::new(),
        },
        now,
        TimeDelta::hours(24),
    );

    // Verify Send + Sync by spawning tasks
    let store_handle = tokio::spawn(async move {
        let outcome = store.insert_pending(payment, now).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        store
            .get(&Reference::parse("DYN-1").unwrap())
            .await
            .unwrap()
            .unwrap()
    });

    let gateway_handle = tokio::spawn(async move { gateway.supported_channels() });

    let retrieved = store_handle.await.unwrap();
    assert_eq!(retrieved.user_id, "u1");

    let channels = gateway_handle.await.unwrap();
    assert!(!channels.is_empty());
}
