//! relink-core: playlist track relinking and batch conversion
//!
//! - [`resolution`]: turns stale playlist paths into files on disk, learning
//!   from user corrections
//! - [`batch`]: bounded-concurrency job runner with progress and cancellation
//! - [`conversion`]: plans and runs re-encoding of the resolved files
//! - [`gate`]: the FIFO counting semaphore behind the batch runner

pub mod batch;
pub mod conversion;
pub mod error;
pub mod gate;
pub mod resolution;
pub mod types;

pub use crate::error::ConversionError;
pub use crate::types::{
    ConversionJob, ConversionResult, LocationResult, ResolutionMethod, TrackRef, FOUND_THRESHOLD,
};
