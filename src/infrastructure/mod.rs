//! Adapters implementing the domain ports.

pub mod in_memory;
pub mod paystack;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod simulator;
