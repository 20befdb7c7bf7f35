//! # Relink Common Library
//!
//! Shared code for the relink workspace:
//! - Error type and result alias
//! - Configuration loading (TOML bootstrap + environment overrides)
//! - Progress event types and the broadcast EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
