//! File resolution engine
//!
//! Runs the strategy cascade for each track and folds the outcome into a single
//! [`LocationResult`]. Directory search is read-only.

use super::learning::{LearningStore, PathMapping};
use super::scanner::{AudioFileScanner, CandidateIndex};
use super::strategies::{ResolutionContext, Strategy};
use crate::types::{LocationResult, ResolutionMethod, TrackRef};
use chrono::Utc;
use relink_common::events::{EventBus, RelinkEvent};
use relink_common::{Error, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves playlist tracks to files on disk
pub struct FileResolutionEngine {
    search_directories: Vec<PathBuf>,
    scanner: AudioFileScanner,
    learning: LearningStore,
    event_bus: Option<EventBus>,
}

impl FileResolutionEngine {
    pub fn new(search_directories: Vec<PathBuf>) -> Self {
        Self {
            search_directories,
            scanner: AudioFileScanner::new(),
            learning: LearningStore::new(),
            event_bus: None,
        }
    }

    pub fn with_scanner(mut self, scanner: AudioFileScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Publish resolution progress on `bus`
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn search_directories(&self) -> &[PathBuf] {
        &self.search_directories
    }

    pub fn learning(&self) -> &LearningStore {
        &self.learning
    }

    fn candidate_index(&self) -> CandidateIndex {
        CandidateIndex::new(self.scanner.clone(), self.search_directories.clone())
    }

    /// Resolve a single track
    pub fn resolve(&self, track: &TrackRef) -> LocationResult {
        let index = self.candidate_index();
        self.resolve_with(track, &index)
    }

    /// Resolve tracks in order, calling `on_progress(completed, total)` after each
    ///
    /// The search directories are enumerated at most once for the whole pass.
    pub fn resolve_all<F>(&self, tracks: &[TrackRef], mut on_progress: F) -> Vec<LocationResult>
    where
        F: FnMut(usize, usize),
    {
        let total = tracks.len();
        let index = self.candidate_index();
        let mut results = Vec::with_capacity(total);

        info!(tracks = total, "Resolving playlist tracks");

        for (i, track) in tracks.iter().enumerate() {
            let result = self.resolve_with(track, &index);
            self.emit_resolved(track, &result);
            results.push(result);

            let completed = i + 1;
            on_progress(completed, total);
            self.emit(RelinkEvent::ResolutionProgress {
                completed,
                total,
                timestamp: Utc::now(),
            });
        }

        let found = results.iter().filter(|r| r.is_found()).count();
        info!(found, missing = total - found, "Resolution complete");

        results
    }

    /// [`resolve_all`](Self::resolve_all) on the blocking pool
    pub async fn resolve_all_async<F>(
        self: Arc<Self>,
        tracks: Vec<TrackRef>,
        on_progress: F,
    ) -> Result<Vec<LocationResult>>
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.resolve_all(&tracks, on_progress))
            .await
            .map_err(|e| Error::Internal(format!("Resolution task failed: {}", e)))
    }

    /// Learn a prefix mapping from a manual correction
    pub fn record_correction(&self, original: &str, corrected: &str) -> Option<PathMapping> {
        self.learning.record_correction(original, corrected)
    }

    /// Replace `result` with the user's choice and learn from it
    ///
    /// The original result is left untouched; the returned one is `UserProvided`
    /// with full confidence.
    pub fn apply_correction(
        &self,
        result: &LocationResult,
        corrected: impl Into<PathBuf>,
    ) -> LocationResult {
        let corrected = corrected.into();
        self.record_correction(result.original_path(), &corrected.to_string_lossy());

        LocationResult::found(
            result.original_path(),
            corrected,
            1.0,
            ResolutionMethod::UserProvided,
            result.alternatives().to_vec(),
        )
    }

    fn resolve_with(&self, track: &TrackRef, index: &CandidateIndex) -> LocationResult {
        if track.original_path.is_empty() {
            debug!(track_id = %track.id, "Empty original path");
            return LocationResult::not_found("", Vec::new());
        }

        let ctx = ResolutionContext {
            learning: &self.learning,
            candidates: index,
        };

        let mut seen = HashSet::new();
        let mut alternatives = Vec::new();

        for strategy in Strategy::CASCADE {
            let Some(result) = strategy.attempt(track, &ctx) else {
                continue;
            };

            if result.is_found() {
                debug!(
                    track_id = %track.id,
                    method = %result.method(),
                    confidence = result.confidence(),
                    "Track resolved"
                );
                return result;
            }

            for path in result.alternatives() {
                if seen.insert(path.clone()) {
                    alternatives.push(path.clone());
                }
            }
        }

        debug!(
            track_id = %track.id,
            original_path = %track.original_path,
            alternatives = alternatives.len(),
            "Track not found"
        );
        LocationResult::not_found(track.original_path.clone(), alternatives)
    }

    fn emit_resolved(&self, track: &TrackRef, result: &LocationResult) {
        self.emit(RelinkEvent::TrackResolved {
            track_id: track.id.clone(),
            method: result.method().to_string(),
            confidence: result.confidence(),
            resolved_path: result
                .resolved_path()
                .map(|p| p.to_string_lossy().into_owned()),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: RelinkEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}
