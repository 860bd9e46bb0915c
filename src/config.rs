use crate::application::lifecycle::LifecycleSettings;
use crate::domain::reference::ReferenceGenerator;
use crate::error::{PaymentError, Result};
use crate::infrastructure::paystack::{DEFAULT_BASE_URL, PaystackConfig};
use chrono::TimeDelta;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Payment lifecycle service backed by the Paystack transaction API.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "PAYFLOW_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYFLOW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Use the in-process gateway simulator instead of Paystack.
    #[arg(long)]
    pub simulate: bool,

    /// Paystack secret key. Required unless --simulate is set.
    #[arg(long, env = "PAYSTACK_SECRET_KEY", hide_env_values = true)]
    pub paystack_secret_key: Option<String>,

    #[arg(long, env = "PAYSTACK_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub paystack_base_url: String,

    /// ISO currency code sent to the gateway.
    #[arg(long, env = "PAYFLOW_CURRENCY", default_value = "KES")]
    pub currency: String,

    /// Where the gateway redirects the payer after checkout.
    #[arg(
        long,
        env = "PAYFLOW_CALLBACK_URL",
        default_value = "http://localhost:8000/payments/callback"
    )]
    pub callback_url: String,

    /// Timeout for a single gateway request, in seconds.
    #[arg(long, default_value_t = 10)]
    pub gateway_timeout_secs: u64,

    /// Extra verify attempts after transient gateway failures.
    #[arg(long, default_value_t = 2)]
    pub verify_retries: u32,

    /// Hours before a pending payment expires.
    #[arg(long, default_value_t = 24)]
    pub payment_ttl_hours: u32,

    /// Maximum number of records returned by a listing.
    #[arg(long, default_value_t = 50)]
    pub page_size: usize,

    /// Prefix of generated payment references.
    #[arg(long, default_value = "PAY")]
    pub reference_prefix: String,

    /// Business name attached to gateway transaction metadata.
    #[arg(long, env = "PAYFLOW_BUSINESS_NAME")]
    pub business_name: Option<String>,
}

impl Config {
    pub fn paystack(&self) -> Result<PaystackConfig> {
        let secret_key = self
            .paystack_secret_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PaymentError::ValidationError(
                    "PAYSTACK_SECRET_KEY is not set; pass --paystack-secret-key or use --simulate"
                        .to_string(),
                )
            })?;

        let mut config = PaystackConfig::new(secret_key);
        config.base_url = self.paystack_base_url.clone();
        config.timeout = Duration::from_secs(self.gateway_timeout_secs.max(1));
        config.verify_retries = self.verify_retries;
        config.business_name = self.business_name.clone();
        Ok(config)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            currency: self.currency.trim().to_ascii_uppercase(),
            callback_url: self.callback_url.clone(),
            payment_ttl: TimeDelta::hours(i64::from(self.payment_ttl_hours)),
            page_size: self.page_size.max(1),
            ..LifecycleSettings::default()
        }
    }

    pub fn reference_generator(&self) -> ReferenceGenerator {
        ReferenceGenerator::new(self.reference_prefix.clone())
    }
}
