#![allow(dead_code)]

use payflow::application::lifecycle::{InitializeRequest, LifecycleSettings, PaymentLifecycle};
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use payflow::infrastructure::simulator::SimulatedGateway;
use serde_json::Value;
use std::sync::Arc;

pub struct Fixture {
    pub lifecycle: Arc<PaymentLifecycle>,
    pub store: InMemoryPaymentStore,
    pub gateway: SimulatedGateway,
}

/// A lifecycle wired to an in-memory store and the simulated gateway. The store and
/// gateway handles share state with the ones inside the lifecycle.
pub fn fixture() -> Fixture {
    fixture_with(LifecycleSettings::default())
}

pub fn fixture_with(settings: LifecycleSettings) -> Fixture {
    let store = InMemoryPaymentStore::new();
    let gateway = SimulatedGateway::new();
    let lifecycle = PaymentLifecycle::new(
        Box::new(store.clone()),
        Box::new(gateway.clone()),
        settings,
    );
    Fixture {
        lifecycle: Arc::new(lifecycle),
        store,
        gateway,
    }
}

pub fn init_request(user_id: &str, amount: Value) -> InitializeRequest {
    InitializeRequest {
        amount: Some(amount),
        email: Some("a@b.com".to_string()),
        user_id: Some(user_id.to_string()),
        ..Default::default()
    }
}
