//! Nitella Core - trust establishment between the CLI, nodes and the Hub.
//!
//! This crate implements:
//! - Root CA identity: creation, mnemonic recovery, encrypted storage
//! - Live pairing exchange over a PAKE-keyed message stream
//! - Offline pairing through QR payloads
//! - Hub trust-on-first-use challenges and onboarding
//! - Storage of signed node certificates
//! - Configuration

#![forbid(unsafe_code)]

// Flows
pub mod exchange;
pub mod offline;
pub mod trust;

// Identity and storage
pub mod identity;
pub mod node_store;
pub mod qr;

// Supporting modules
pub mod config;
pub mod errors;
pub mod harness;

mod files;

#[cfg(test)]
mod proptests;

pub use errors::{
    ConfigError, ExchangeError, IdentityError, OfflineError, OnboardError, QrError, StoreError,
    TrustError,
};
