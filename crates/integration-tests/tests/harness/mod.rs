//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

pub mod config;
pub mod mock_health;
pub mod mock_vendor;
pub mod recording;
