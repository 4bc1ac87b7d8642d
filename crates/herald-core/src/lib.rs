//! Core domain + lifecycle logic for the herald chat-automation host.
//!
//! This crate is deliberately network-agnostic. The messaging gateway and the
//! worker's control link live behind ports (traits) implemented in the adapter
//! and binary crates.

pub mod config;
pub mod control;
pub mod credentials;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod ports;
pub mod registry;
pub mod supervisor;
pub mod utils;

pub use errors::{Error, Result};
