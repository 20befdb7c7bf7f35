//! Core data model
//!
//! - [`TrackRef`]: a playlist entry as delivered by the external parser
//! - [`LocationResult`]: outcome of resolving one track to a file on disk
//! - [`ConversionJob`] / [`ConversionResult`]: one unit of batch work and its outcome

use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum confidence for a resolution to count as found
pub const FOUND_THRESHOLD: f32 = 0.5;

/// Playlist track reference
///
/// Identity is `id`. `original_path` may be stale, empty or URL-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub original_path: String,
}

impl TrackRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        original_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            album: album.into(),
            duration_seconds: None,
            original_path: original_path.into(),
        }
    }
}

/// How a track was located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionMethod {
    ExactPath,
    PathTranslation,
    FilenameSearch,
    MetadataMatch,
    UserProvided,
    NotFound,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionMethod::ExactPath => "ExactPath",
            ResolutionMethod::PathTranslation => "PathTranslation",
            ResolutionMethod::FilenameSearch => "FilenameSearch",
            ResolutionMethod::MetadataMatch => "MetadataMatch",
            ResolutionMethod::UserProvided => "UserProvided",
            ResolutionMethod::NotFound => "NotFound",
        };
        f.write_str(name)
    }
}

/// Result of resolving one track
///
/// Invariant: `resolved_path.is_some()` iff `method != NotFound`. The fields are
/// private so the invariant holds for every value; use [`LocationResult::found`]
/// and [`LocationResult::not_found`] to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    original_path: String,
    resolved_path: Option<PathBuf>,
    confidence: f32,
    method: ResolutionMethod,
    alternatives: Vec<PathBuf>,
}

impl LocationResult {
    /// A located file. `method` must not be `NotFound`; confidence is clamped to [0, 1].
    pub fn found(
        original_path: impl Into<String>,
        resolved_path: PathBuf,
        confidence: f32,
        method: ResolutionMethod,
        alternatives: Vec<PathBuf>,
    ) -> Self {
        debug_assert!(method != ResolutionMethod::NotFound);
        let alternatives = alternatives
            .into_iter()
            .filter(|p| *p != resolved_path)
            .collect();
        Self {
            original_path: original_path.into(),
            resolved_path: Some(resolved_path),
            confidence: confidence.clamp(0.0, 1.0),
            method,
            alternatives,
        }
    }

    /// No usable match; `alternatives` are candidates for manual review
    pub fn not_found(original_path: impl Into<String>, alternatives: Vec<PathBuf>) -> Self {
        Self {
            original_path: original_path.into(),
            resolved_path: None,
            confidence: 0.0,
            method: ResolutionMethod::NotFound,
            alternatives,
        }
    }

    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    pub fn resolved_path(&self) -> Option<&PathBuf> {
        self.resolved_path.as_ref()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn method(&self) -> ResolutionMethod {
        self.method
    }

    /// Candidate paths other than the chosen one, best first
    pub fn alternatives(&self) -> &[PathBuf] {
        &self.alternatives
    }

    /// Located with confidence above [`FOUND_THRESHOLD`]
    pub fn is_found(&self) -> bool {
        self.resolved_path.is_some() && self.confidence > FOUND_THRESHOLD
    }
}

/// One conversion: derived 1:1 from a found [`LocationResult`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl ConversionJob {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }
}

/// Outcome of one [`ConversionJob`]; produced exactly once per job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub error_kind: Option<ConversionError>,
    pub elapsed: Duration,
    pub output_size: Option<u64>,
}

impl ConversionResult {
    pub fn succeeded(job: &ConversionJob, elapsed: Duration, output_size: Option<u64>) -> Self {
        Self {
            input_path: job.input_path.clone(),
            output_path: Some(job.output_path.clone()),
            success: true,
            error_kind: None,
            elapsed,
            output_size,
        }
    }

    pub fn failed(job: &ConversionJob, error: ConversionError, elapsed: Duration) -> Self {
        Self {
            input_path: job.input_path.clone(),
            output_path: None,
            success: false,
            error_kind: Some(error),
            elapsed,
            output_size: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error_kind, Some(ConversionError::Cancelled))
    }
}
