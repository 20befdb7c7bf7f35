//! Error types for relink-core
//!
//! Resolution failures are data (`ResolutionMethod::NotFound`), never errors.
//! Per-job conversion failures are captured as [`ConversionError`] inside
//! `ConversionResult` and never abort a batch.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Why a single conversion job did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason")]
pub enum ConversionError {
    /// Job was cancelled before it started
    #[error("Cancelled")]
    Cancelled,

    /// Transcoding backend failed
    #[error("Transform failed: {0}")]
    TransformFailed(String),

    /// Output location could not be created or written
    #[error("Output path error: {0}")]
    OutputPathError(String),

    /// Not enough free space on the output volume
    #[error("Insufficient space on output volume")]
    InsufficientSpace,
}

impl ConversionError {
    /// Short kind name (for events and summaries)
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConversionError::Cancelled => "Cancelled",
            ConversionError::TransformFailed(_) => "TransformFailed",
            ConversionError::OutputPathError(_) => "OutputPathError",
            ConversionError::InsufficientSpace => "InsufficientSpace",
        }
    }

    /// Classify an opaque backend error
    ///
    /// The backend's own [`ConversionError`] passes through unchanged. I/O errors
    /// map by kind: a full disk is `InsufficientSpace`, missing or forbidden
    /// locations are `OutputPathError`. Everything else is `TransformFailed`.
    ///
    /// The I/O mapping assumes the error is about the output side. The
    /// coordinator checks that the input exists before calling the backend, so
    /// a missing source is reported as `TransformFailed` and never reaches here.
    pub fn classify(error: &anyhow::Error) -> Self {
        if let Some(conversion) = error.downcast_ref::<ConversionError>() {
            return conversion.clone();
        }

        for cause in error.chain() {
            if let Some(io_error) = cause.downcast_ref::<io::Error>() {
                return match io_error.kind() {
                    io::ErrorKind::StorageFull => ConversionError::InsufficientSpace,
                    io::ErrorKind::NotFound
                    | io::ErrorKind::PermissionDenied
                    | io::ErrorKind::ReadOnlyFilesystem
                    | io::ErrorKind::AlreadyExists => {
                        ConversionError::OutputPathError(format!("{:#}", error))
                    }
                    _ => ConversionError::TransformFailed(format!("{:#}", error)),
                };
            }
        }

        ConversionError::TransformFailed(format!("{:#}", error))
    }
}
