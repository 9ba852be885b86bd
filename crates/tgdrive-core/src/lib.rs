//! Core domain + upload engine for the Telegram → Google Drive relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and Google Drive
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod ports;
pub mod source;
pub mod token_cache;
pub mod transfer;

pub use errors::{Error, Result};
