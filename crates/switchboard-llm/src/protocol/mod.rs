//! Wire format types for provider-specific API protocols
//!
//! Each module contains pure serde structs matching the respective provider's
//! JSON API format, trimmed to the text-only subset the canonical protocol
//! carries. These types never leave the crate's transport boundary.

pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;
