//! Domain model: payment records, references, metadata, and the ports the
//! application layer talks to.

pub mod gateway;
pub mod metadata;
pub mod payment;
pub mod ports;
pub mod reference;
