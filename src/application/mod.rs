//! Application layer containing the payment lifecycle orchestration.
//!
//! This module defines `PaymentLifecycle`, the entry point for initializing,
//! verifying, and reading payments. It drives the domain ports (record store and
//! payment gateway) and owns no state of its own beyond its settings.

pub mod lifecycle;
