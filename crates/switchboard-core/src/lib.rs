//! Shared vocabulary for switchboard crates
//!
//! Holds the per-call credential context, the closed provider error
//! taxonomy, and the contract for reporting credential health findings.

#![allow(clippy::must_use_candidate)]

mod context;
mod error;
mod health;

pub use context::CredentialContext;
pub use error::{ErrorKind, ProviderErrorInfo};
pub use health::{CredentialHealth, LoggingHealth, NoopHealth};
