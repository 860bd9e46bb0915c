use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::lifecycle::PaymentLifecycle;
use payflow::config::Config;
use payflow::domain::ports::{PaymentGatewayBox, PaymentStoreBox};
use payflow::infrastructure::in_memory::InMemoryPaymentStore;
use payflow::infrastructure::paystack::PaystackGateway;
use payflow::infrastructure::simulator::SimulatedGateway;
use payflow::interfaces::http::router;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<PaymentStoreBox> {
    match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store =
                payflow::infrastructure::rocksdb::RocksDBStore::open(db_path).into_diagnostic()?;
            info!(path = %db_path.display(), "Using RocksDB payment store");
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryPaymentStore::new()))
        }
        None => Ok(Box::new(InMemoryPaymentStore::new())),
    }
}

fn open_gateway(config: &Config) -> Result<PaymentGatewayBox> {
    if config.simulate {
        warn!("Running against the gateway simulator; no real payments will be taken");
        return Ok(Box::new(SimulatedGateway::new()));
    }
    let gateway = PaystackGateway::new(config.paystack().into_diagnostic()?).into_diagnostic()?;
    Ok(Box::new(gateway))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing();

    let gateway = open_gateway(&config)?;
    let store = open_store(&config)?;

    let lifecycle = PaymentLifecycle::new(store, gateway, config.lifecycle_settings())
        .with_reference_generator(config.reference_generator());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .into_diagnostic()?;
    info!(addr = %config.bind, currency = %config.currency, "Payment API listening");

    axum::serve(listener, router(Arc::new(lifecycle)))
        .await
        .into_diagnostic()?;

    Ok(())
}
