//! Credential-health reporting for Switchboard
//!
//! Ships classified provider failures to an external service that owns
//! key lifecycle decisions.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod circuit;
pub mod client;
pub mod error;
pub mod reporter;

pub use client::HealthClient;
pub use error::HealthError;
pub use reporter::HealthReporter;
