//! Core domain + application logic for postwatch.
//!
//! This crate is framework-agnostic. The readability proxy, the headless browser and
//! Slack live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod ports;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::{Error, Result};
